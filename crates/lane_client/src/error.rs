//! Lane client error types

use contracts::ContractError;
use thiserror::Error;

/// Lane engine client error
#[derive(Debug, Error)]
pub enum LaneClientError {
    /// Could not reach the lane engine
    #[error("failed to connect to lane engine: {message}")]
    ConnectionFailed { message: String },

    /// Command issued before `connect` or after `close`
    #[error("lane engine connection is not open")]
    NotConnected,

    /// The engine answered a command with an error status
    #[error("lane engine rejected '{command}': {message}")]
    CommandRejected { command: String, message: String },

    /// Malformed or unexpected bytes on the wire
    #[error("protocol error: {message}")]
    Protocol { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl LaneClientError {
    /// Create command rejected error
    pub fn rejected(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CommandRejected {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, LaneClientError>;
