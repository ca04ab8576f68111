//! HTTP backend for a Twitter-v2-style REST API
//!
//! Endpoints used:
//! - `GET  /2/users/me` to authenticate and learn our user id
//! - `POST /2/tweets` to post, with `reply.in_reply_to_tweet_id` for chains
//! - `GET  /2/users/{id}/mentions` to list mentions, following `next_token`

use crate::api::{ApiError, RemoteApi};
use advbot_core::{Credentials, MentionRecord, MessageId};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com";

/// The service accepts 5..=100 results per mentions page
const MIN_PAGE_SIZE: usize = 5;
const MAX_PAGE_SIZE: usize = 100;

/// Mentions backlog we are willing to page through in one call
const MAX_PAGES: usize = 20;

/// `RemoteApi` over HTTPS with a bearer token
pub struct HttpApi {
    client: Client,
    base_url: String,
    /// Bearer token, set by `authenticate`
    token: Option<String>,
    /// Our account id, set by `authenticate`
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TweetData {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<UserData>,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct PostRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTo>,
}

#[derive(Debug, Serialize)]
struct ReplyTo {
    in_reply_to_tweet_id: String,
}

impl HttpApi {
    /// Create an unauthenticated backend for `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            user_id: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized("not authenticated".into()))?;
        Ok(request.bearer_auth(token))
    }

    fn user_id(&self) -> Result<&str, ApiError> {
        self.user_id
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized("not authenticated".into()))
    }

    /// Send `request` and decode a successful JSON body
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::Unexpected(format!("Invalid response body: {}", e)))
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), ApiError> {
        self.token = Some(credentials.access_token.clone());

        let request = self.authorized(self.client.get(self.url("/2/users/me")))?;
        let envelope: Envelope<UserData> = match self.send(request).await {
            Ok(envelope) => envelope,
            Err(e) => {
                self.token = None;
                return Err(e);
            }
        };
        let user = envelope
            .data
            .ok_or_else(|| ApiError::Unexpected("No user in /2/users/me response".into()))?;

        info!(
            "Authenticated as {} ({})",
            user.username.as_deref().unwrap_or("?"),
            user.id
        );
        self.user_id = Some(user.id);
        Ok(())
    }

    async fn post_message(
        &mut self,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ApiError> {
        let body = PostRequest {
            text,
            reply: reply_to.map(|id| ReplyTo {
                in_reply_to_tweet_id: id.to_string(),
            }),
        };
        let request = self.authorized(self.client.post(self.url("/2/tweets")).json(&body))?;
        let envelope: Envelope<TweetData> = self.send(request).await?;
        let tweet = envelope
            .data
            .ok_or_else(|| ApiError::Unexpected("No data in post response".into()))?;

        let id = parse_id(&tweet.id)?;
        debug!("Posted {} (reply to {:?})", id, reply_to);
        Ok(id)
    }

    async fn list_mentions(
        &mut self,
        since: Option<MessageId>,
        max_results: Option<usize>,
    ) -> Result<Vec<MentionRecord>, ApiError> {
        let path = format!("/2/users/{}/mentions", self.user_id()?);
        let mut pages = MentionPages::new(max_results);
        let mut pagination_token: Option<String> = None;

        loop {
            let query = mentions_query(since, max_results, pagination_token.take());
            let request = self.authorized(self.client.get(self.url(&path)).query(&query))?;
            let page: Envelope<Vec<TweetData>> = self.send(request).await?;
            match pages.push(page)? {
                Some(token) => pagination_token = Some(token),
                None => break,
            }
        }

        Ok(pages.finish())
    }
}

/// Query parameters for one mentions page
fn mentions_query(
    since: Option<MessageId>,
    max_results: Option<usize>,
    pagination_token: Option<String>,
) -> Vec<(&'static str, String)> {
    let page_size = max_results
        .unwrap_or(MAX_PAGE_SIZE)
        .clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE);

    let mut query = vec![
        ("max_results", page_size.to_string()),
        ("expansions", "author_id".to_string()),
        ("user.fields", "username".to_string()),
    ];
    // an id of zero means "from the beginning"
    if let Some(since) = since.filter(|id| id.0 > 0) {
        query.push(("since_id", since.to_string()));
    }
    if let Some(token) = pagination_token {
        query.push(("pagination_token", token));
    }
    query
}

/// Mentions collected across pages
struct MentionPages {
    max_results: Option<usize>,
    mentions: Vec<MentionRecord>,
    pages: usize,
}

impl MentionPages {
    fn new(max_results: Option<usize>) -> Self {
        Self {
            max_results,
            mentions: Vec::new(),
            pages: 0,
        }
    }

    /// Add a page and return the token of the next page to fetch, if any
    fn push(&mut self, page: Envelope<Vec<TweetData>>) -> Result<Option<String>, ApiError> {
        let next = page.meta.as_ref().and_then(|m| m.next_token.clone());
        self.mentions.extend(records_from_page(page)?);
        self.pages += 1;

        if self.max_results.is_some_and(|max| self.mentions.len() >= max) {
            return Ok(None);
        }
        if next.is_some() && self.pages >= MAX_PAGES {
            warn!(
                "Mentions backlog exceeds {} pages; older mentions will be skipped",
                MAX_PAGES
            );
            return Ok(None);
        }
        Ok(next)
    }

    fn finish(mut self) -> Vec<MentionRecord> {
        // pages arrive newest first
        if let Some(max) = self.max_results {
            self.mentions.sort_by(|a, b| b.id.cmp(&a.id));
            self.mentions.truncate(max);
        }
        self.mentions
    }
}

/// Map a non-success HTTP status to an error class
pub fn classify_status(status: StatusCode, body: &str) -> ApiError {
    let detail = format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>());
    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(detail),
        s if s.is_server_error() => ApiError::Network(detail),
        _ => ApiError::Unexpected(detail),
    }
}

/// Map a transport failure to an error class
fn classify_transport(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        ApiError::Network(err.to_string())
    } else {
        ApiError::Unexpected(err.to_string())
    }
}

fn parse_id(id: &str) -> Result<MessageId, ApiError> {
    id.parse::<u64>()
        .map(MessageId)
        .map_err(|_| ApiError::Unexpected(format!("Invalid message id: {:?}", id)))
}

fn records_from_page(page: Envelope<Vec<TweetData>>) -> Result<Vec<MentionRecord>, ApiError> {
    let usernames: HashMap<String, String> = page
        .includes
        .unwrap_or_default()
        .users
        .into_iter()
        .filter_map(|u| u.username.map(|name| (u.id, name)))
        .collect();

    page.data
        .unwrap_or_default()
        .into_iter()
        .map(|tweet| {
            let author = tweet
                .author_id
                .map(|id| usernames.get(&id).cloned().unwrap_or(id))
                .unwrap_or_default();
            Ok(MentionRecord {
                id: parse_id(&tweet.id)?,
                text: tweet.text,
                author,
            })
        })
        .collect()
}
