//! Bridge error types

use contracts::ContractError;
use lane_client::LaneClientError;
use thiserror::Error;

/// Bridge specific error
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Junction program parameters could not be parsed
    #[error("invalid topology for junction '{junction}': {message}")]
    Topology { junction: String, message: String },

    /// Landmark controls a number of directions the translation cannot merge
    #[error("landmark '{landmark}' has {count} directions of travel, expected 2 or 3")]
    UnsupportedDirectionCount { landmark: String, count: usize },

    /// Link index outside the live state string of its junction
    #[error("landmark '{landmark}': link {link_index} outside state of junction '{junction}' ({width} links)")]
    LinkOutOfRange {
        landmark: String,
        junction: String,
        link_index: usize,
        width: usize,
    },

    /// World side has no light for the landmark
    #[error("landmark '{landmark}' does not resolve to a world light")]
    UnresolvedLandmark { landmark: String },

    /// Lane engine refused to add a vehicle
    #[error("failed to spawn '{actor_id}': {message}")]
    SpawnRejected { actor_id: String, message: String },

    /// No subscription result for the actor this step
    #[error("actor '{actor_id}' has no subscription result")]
    NotSubscribed { actor_id: String },

    /// Session setup could not complete
    #[error("session setup failed: {message}")]
    Setup { message: String },

    #[error("session is closed")]
    SessionClosed,

    /// Wrapped lane engine error
    #[error(transparent)]
    Lane(#[from] LaneClientError),

    /// Wrapped ContractError
    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl BridgeError {
    /// Create topology error
    pub fn topology(junction: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Topology {
            junction: junction.into(),
            message: message.into(),
        }
    }

    /// Create unsupported direction count error
    pub fn unsupported_directions(landmark: impl Into<String>, count: usize) -> Self {
        Self::UnsupportedDirectionCount {
            landmark: landmark.into(),
            count,
        }
    }

    /// Create setup error
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }
}

/// Result alias
pub type Result<T> = std::result::Result<T, BridgeError>;
