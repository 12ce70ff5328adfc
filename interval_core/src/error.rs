//! Error types for the interval_core library.

use crate::types::Phase;
use std::fmt;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for interval_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Achievement catalog validation error
    #[error("Achievement validation error: {0}")]
    AchievementValidation(String),

    /// Persistence port error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A user action that the current phase does not accept
    #[error("{0}")]
    InvalidTransition(TransitionRejection),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Why a requested action was refused.
///
/// The session is never mutated when one of these is returned; the caller
/// decides how to show the refusal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionRejection {
    pub action: &'static str,
    pub phase: Phase,
    pub reason: RejectionReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionReason {
    /// The action has no edge out of this phase
    NotAllowedInPhase,
    /// Leaving rest early is disabled by policy
    RestSkipDisabled,
}

impl fmt::Display for TransitionRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            RejectionReason::NotAllowedInPhase => write!(
                f,
                "cannot {} during the {} phase",
                self.action, self.phase
            ),
            RejectionReason::RestSkipDisabled => {
                write!(f, "skipping rest is disabled; take the break")
            }
        }
    }
}

impl Error {
    pub(crate) fn rejected(action: &'static str, phase: Phase, reason: RejectionReason) -> Self {
        Error::InvalidTransition(TransitionRejection {
            action,
            phase,
            reason,
        })
    }

    /// The refusal carried by this error, if it is one
    pub fn rejection(&self) -> Option<&TransitionRejection> {
        match self {
            Error::InvalidTransition(r) => Some(r),
            _ => None,
        }
    }
}
