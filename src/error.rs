//! Error taxonomy shared by the planners, the session state machine and the
//! speech capabilities.

use thiserror::Error;

use crate::session::Phase;

/// Errors surfaced to the user-facing flow.
///
/// The sanitizer and the local stores never fail, so they have no variant here.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoachError {
    /// Input rejected before any request was made (e.g. an empty task).
    #[error("Validation error: {0}")]
    Validation(String),

    /// The decomposition request failed (network, status, or malformed body).
    #[error("Decomposition failed: {0}")]
    DecompositionFailed(String),

    /// The "stuck" clarification request failed.
    #[error("Clarification failed: {0}")]
    ClarificationFailed(String),

    /// Voice input or output is not available in this environment.
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// An action was issued in a state that does not accept it.
    #[error("Cannot {action} while {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },
}

impl CoachError {
    /// Short, user-facing notice for this error.
    pub fn notice(&self) -> String {
        match self {
            CoachError::Validation(msg) => msg.clone(),
            CoachError::DecompositionFailed(_) => {
                "Couldn't break that task down right now. Check the backend and try again."
                    .to_string()
            }
            CoachError::ClarificationFailed(_) => {
                "Couldn't squeeze that step smaller. Keep going or try again.".to_string()
            }
            CoachError::UnsupportedCapability(msg) => msg.clone(),
            CoachError::InvalidTransition { .. } => self.to_string(),
        }
    }
}
