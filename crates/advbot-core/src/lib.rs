//! # advbot-core
//!
//! Core types shared by the advbot crates:
//! - Error and result types
//! - Bridge and remote configuration
//! - Message packing into size-bounded chunks
//! - Mention records and the high-water mark
//! - The reporting hook

pub mod config;
pub mod error;
pub mod mention;
pub mod packer;
pub mod report;

pub use config::{BridgeConfig, Credentials, RemoteConfig};
pub use error::{AdvBotError, Result};
pub use mention::{HighWaterMark, MentionRecord, MessageId};
pub use packer::{DEFAULT_MESSAGE_LIMIT, pack};
pub use report::{
    RecordingReporter, Reporter, Severity, SharedReporter, TracingReporter, tracing_reporter,
};
