//! Serialized, self-healing client for the message service
//!
//! All remote calls go through [`RemoteClient::call`], which holds the
//! session lock for the whole call (backoff included) so only one request is
//! ever in flight. Failures never reach the caller; they are classified,
//! reported, slept off and turned into `None`.

use crate::api::{ApiError, FailureClass, RemoteApi};
use crate::operation::{ListMentions, Operation, PostMessage};
use advbot_core::{
    AdvBotError, Credentials, HighWaterMark, MentionRecord, MessageId, RemoteConfig, Result,
    Severity, SharedReporter, pack, tracing_reporter,
};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info};

/// Client for the remote message-chain service
pub struct RemoteClient<A> {
    /// The session; locking it is the single-flight gate
    session: Mutex<A>,
    /// Largest mention id handed out so far
    mark: Mutex<HighWaterMark>,
    config: RemoteConfig,
    reporter: SharedReporter,
}

impl<A: RemoteApi> RemoteClient<A> {
    /// Authenticate `api` and wrap it in a client
    ///
    /// Rejected credentials fail with [`AdvBotError::FatalAuth`]; nothing
    /// is retried.
    pub async fn authenticate(api: A, credentials: &Credentials, config: RemoteConfig) -> Result<Self> {
        Self::authenticate_with_reporter(api, credentials, config, tracing_reporter()).await
    }

    pub async fn authenticate_with_reporter(
        mut api: A,
        credentials: &Credentials,
        config: RemoteConfig,
        reporter: SharedReporter,
    ) -> Result<Self> {
        if config.message_limit == 0 {
            return Err(AdvBotError::InvalidArgument(
                "message_limit must be positive".into(),
            ));
        }

        api.authenticate(credentials).await.map_err(|e| match e {
            ApiError::Unauthorized(msg) => AdvBotError::FatalAuth(msg),
            other => AdvBotError::IpcError(format!("Authentication failed: {}", other)),
        })?;
        info!("Remote session authenticated");

        Ok(Self {
            session: Mutex::new(api),
            mark: Mutex::new(HighWaterMark::new()),
            config,
            reporter,
        })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Current high-water mark
    pub async fn high_water_mark(&self) -> HighWaterMark {
        *self.mark.lock().await
    }

    /// Run one operation under the gate.
    ///
    /// Returns `None` after a failure, once the backoff for its class has
    /// elapsed.
    pub async fn call<O: Operation>(&self, op: &O) -> Option<O::Output> {
        let mut session = self.session.lock().await;
        debug!("Remote call: {}", op.describe());

        match op.execute(&mut *session).await {
            Ok(output) => Some(output),
            Err(err) => {
                let (severity, backoff) = match err.class() {
                    FailureClass::RateLimited => {
                        (Severity::Warning, self.config.rate_limit_backoff())
                    }
                    FailureClass::TransientNetwork => {
                        (Severity::Warning, self.config.network_backoff())
                    }
                    FailureClass::Unexpected => {
                        (Severity::Critical, self.config.unexpected_backoff())
                    }
                };
                self.reporter.report(
                    severity,
                    &format!(
                        "{} failed ({:?}), backing off {:?}: {}",
                        op.describe(),
                        err.class(),
                        backoff,
                        err
                    ),
                );
                sleep(backoff).await;
                None
            }
        }
    }

    /// Post `messages` as a reply chain and return the ids in order.
    ///
    /// The text is packed into chunks of at most `message_limit` characters.
    /// Each chunk is retried until it is accepted, so this blocks for as long
    /// as the service stays unreachable rather than lose output.
    pub async fn send_message_chain<S: AsRef<str>>(
        &self,
        messages: &[S],
        mut reply_to: Option<MessageId>,
    ) -> Result<Vec<MessageId>> {
        let chunks = pack(messages, self.config.message_limit)?;
        let mut ids = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let op = PostMessage::new(chunk, reply_to);
            let id = loop {
                if let Some(id) = self.call(&op).await {
                    break id;
                }
                debug!("Retrying {}", op.describe());
            };
            reply_to = Some(id);
            ids.push(id);
        }

        Ok(ids)
    }

    /// Mentions that arrived since the last call, oldest first.
    ///
    /// The first successful call only records the newest existing mention
    /// and returns nothing, so history is never replayed. A failed fetch
    /// returns an empty list and leaves the mark untouched.
    pub async fn get_latest_mentions(&self) -> Vec<MentionRecord> {
        let mut mark = self.mark.lock().await;

        let op = match mark.get() {
            Some(id) => ListMentions::since(id),
            None => ListMentions::newest(),
        };
        let Some(mut mentions) = self.call(&op).await else {
            return Vec::new();
        };
        mentions.sort_by_key(|m| m.id);

        if !mark.is_initialized() {
            let newest = mentions.last().map(|m| m.id).unwrap_or(MessageId(0));
            mark.advance(newest);
            info!("Mention high-water mark initialized at {}", newest);
            return Vec::new();
        }

        mentions.retain(|m| mark.is_new(m.id));
        mentions.dedup_by_key(|m| m.id);
        if let Some(newest) = mentions.last() {
            mark.advance(newest.id);
            debug!("{} new mentions, mark now {}", mentions.len(), newest.id);
        }
        mentions
    }
}
