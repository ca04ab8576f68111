//! Remote message identifiers, mentions and the high-water mark

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a message on the remote service
///
/// Identifiers increase monotonically with posting time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A message on the remote service that mentions our account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub id: MessageId,
    pub text: String,
    pub author: String,
}

impl MentionRecord {
    pub fn new(id: impl Into<MessageId>, text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author: author.into(),
        }
    }
}

/// Largest mention id already surfaced to callers
///
/// Starts uninitialized and only ever moves upward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighWaterMark(Option<MessageId>);

impl HighWaterMark {
    pub fn new() -> Self {
        Self(None)
    }

    /// Current mark, `None` before the first successful fetch
    pub fn get(&self) -> Option<MessageId> {
        self.0
    }

    pub fn is_initialized(&self) -> bool {
        self.0.is_some()
    }

    /// Raise the mark to `id`. Lower ids are ignored.
    pub fn advance(&mut self, id: MessageId) {
        if self.0.is_none_or(|mark| id > mark) {
            self.0 = Some(id);
        }
    }

    /// Whether `id` has not been surfaced yet
    pub fn is_new(&self, id: MessageId) -> bool {
        self.0.is_none_or(|mark| id > mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_only_moves_up() {
        let mut mark = HighWaterMark::new();
        assert!(!mark.is_initialized());

        mark.advance(MessageId(10));
        mark.advance(MessageId(4));
        assert_eq!(mark.get(), Some(MessageId(10)));

        mark.advance(MessageId(11));
        assert_eq!(mark.get(), Some(MessageId(11)));
    }

    #[test]
    fn test_is_new() {
        let mut mark = HighWaterMark::new();
        assert!(mark.is_new(MessageId(0)));

        mark.advance(MessageId(3));
        assert!(!mark.is_new(MessageId(2)));
        assert!(!mark.is_new(MessageId(3)));
        assert!(mark.is_new(MessageId(4)));
    }

    #[test]
    fn test_message_id_transparent_serde() {
        let record = MentionRecord::new(42, "look", "player1");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":42,"text":"look","author":"player1"}"#);
    }
}
