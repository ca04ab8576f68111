//! Remote service seam
//!
//! `RemoteApi` is the raw session: every failure comes back as an
//! [`ApiError`] and it is up to the caller to decide what to do with it.

use advbot_core::{Credentials, MentionRecord, MessageId};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a remote session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The service's quota was exceeded
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Connection reset, timeout, TLS failure or gateway error
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Anything else
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// How the client reacts to a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimited,
    TransientNetwork,
    Unexpected,
}

impl ApiError {
    pub fn class(&self) -> FailureClass {
        match self {
            ApiError::RateLimited(_) => FailureClass::RateLimited,
            ApiError::Network(_) => FailureClass::TransientNetwork,
            ApiError::Unauthorized(_) | ApiError::Unexpected(_) => FailureClass::Unexpected,
        }
    }
}

/// An authenticated session with the message service
#[async_trait]
pub trait RemoteApi: Send {
    /// Establish the session
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), ApiError>;

    /// Post `text`, optionally as a reply, returning the new message id
    async fn post_message(
        &mut self,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ApiError>;

    /// Mentions with an id greater than `since` (all when `None`).
    ///
    /// With `max_results`, only that many of the newest are returned. No
    /// ordering is guaranteed.
    async fn list_mentions(
        &mut self,
        since: Option<MessageId>,
        max_results: Option<usize>,
    ) -> Result<Vec<MentionRecord>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            ApiError::RateLimited("429".into()).class(),
            FailureClass::RateLimited
        );
        assert_eq!(
            ApiError::Network("reset".into()).class(),
            FailureClass::TransientNetwork
        );
        assert_eq!(
            ApiError::Unauthorized("expired".into()).class(),
            FailureClass::Unexpected
        );
        assert_eq!(
            ApiError::Unexpected("bad json".into()).class(),
            FailureClass::Unexpected
        );
    }
}
