//! Error types for advbot

use thiserror::Error;

/// Result type for advbot operations
pub type Result<T> = std::result::Result<T, AdvBotError>;

/// advbot error types
#[derive(Debug, Error)]
pub enum AdvBotError {
    /// Caller supplied an argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Child process could not be started
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Pipe or socket communication error
    #[error("IPC error: {0}")]
    IpcError(String),

    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Credentials rejected by the remote service
    #[error("Authentication failed: {0}")]
    FatalAuth(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Remote service answered with something we could not interpret
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl From<serde_json::Error> for AdvBotError {
    fn from(err: serde_json::Error) -> Self {
        AdvBotError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for AdvBotError {
    fn from(err: std::io::Error) -> Self {
        AdvBotError::IpcError(err.to_string())
    }
}
