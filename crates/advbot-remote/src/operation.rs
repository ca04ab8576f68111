//! Operation descriptors
//!
//! Each remote call the client makes is described by a value implementing
//! [`Operation`], so one retry wrapper can run any of them.

use crate::api::{ApiError, RemoteApi};
use advbot_core::{MentionRecord, MessageId};
use async_trait::async_trait;

/// A single remote call
#[async_trait]
pub trait Operation: Send + Sync {
    type Output: Send;

    /// Short description for logs
    fn describe(&self) -> String;

    async fn execute(&self, api: &mut dyn RemoteApi) -> Result<Self::Output, ApiError>;
}

/// Post one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostMessage {
    pub text: String,
    pub reply_to: Option<MessageId>,
}

impl PostMessage {
    pub fn new(text: impl Into<String>, reply_to: Option<MessageId>) -> Self {
        Self {
            text: text.into(),
            reply_to,
        }
    }
}

#[async_trait]
impl Operation for PostMessage {
    type Output = MessageId;

    fn describe(&self) -> String {
        match self.reply_to {
            Some(id) => format!("post reply to {} ({} chars)", id, self.text.chars().count()),
            None => format!("post ({} chars)", self.text.chars().count()),
        }
    }

    async fn execute(&self, api: &mut dyn RemoteApi) -> Result<MessageId, ApiError> {
        api.post_message(&self.text, self.reply_to).await
    }
}

/// Fetch mentions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMentions {
    pub since: Option<MessageId>,
    pub max_results: Option<usize>,
}

impl ListMentions {
    /// Only the single newest mention
    pub fn newest() -> Self {
        Self {
            since: None,
            max_results: Some(1),
        }
    }

    /// Every mention after `id`
    pub fn since(id: MessageId) -> Self {
        Self {
            since: Some(id),
            max_results: None,
        }
    }
}

#[async_trait]
impl Operation for ListMentions {
    type Output = Vec<MentionRecord>;

    fn describe(&self) -> String {
        match (self.since, self.max_results) {
            (Some(id), _) => format!("list mentions since {}", id),
            (None, Some(n)) => format!("list newest {} mentions", n),
            (None, None) => "list mentions".to_string(),
        }
    }

    async fn execute(&self, api: &mut dyn RemoteApi) -> Result<Vec<MentionRecord>, ApiError> {
        api.list_mentions(self.since, self.max_results).await
    }
}
