//! Error types
//!
//! Backend and configuration errors are recoverable: the session controller
//! logs them and falls back. None of them reach the tick loop.

use thiserror::Error;

use crate::plays::PlayLimit;
use crate::session::SessionPhase;

/// A collaborator call failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Transport failure (offline, CORS, DNS...)
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status.
    #[error("backend returned status {0}")]
    Status(u16),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// No backend is reachable from this host.
    #[error("backend unavailable")]
    Unavailable,
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Decode(err.to_string())
    }
}

/// A configuration value was rejected during merge.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("discount tier list is empty")]
    EmptyTiers,

    #[error("tier {index} does not raise minScore over the previous tier")]
    NonIncreasingTiers { index: usize },

    #[error("tier {index} offers a smaller discount than the tier below it")]
    DecreasingDiscount { index: usize },

    #[error("tier {index} has discount {discount}% outside 0..=100")]
    DiscountOutOfRange { index: usize, discount: u32 },

    #[error("game speed {0} must be finite and positive")]
    InvalidSpeed(f32),

    #[error("unknown difficulty '{0}'")]
    UnknownDifficulty(String),

    #[error("unknown game type '{0}'")]
    UnknownGameType(String),

    #[error("malformed value: {0}")]
    Malformed(String),
}

/// A session controller call was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("play limit reached: {0}")]
    PlayLimitReached(PlayLimit),

    #[error("cannot {action} while {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: SessionPhase,
    },

    #[error("controller was torn down")]
    TornDown,
}
