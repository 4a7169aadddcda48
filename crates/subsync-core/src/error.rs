// Error types for planning and execution.

use thiserror::Error;

/// Planning failures. Raised before any network call is made.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid lineup request: {}", messages.join("; "))]
    Validation { messages: Vec<String> },

    #[error("swap {out_id} -> {in_id} involves a locked player")]
    LockConflict { out_id: String, in_id: String },
}

impl PlanError {
    pub fn validation(message: impl Into<String>) -> Self {
        PlanError::Validation {
            messages: vec![message.into()],
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// A collaborator failed to reach the remote service. Never retried
    /// implicitly.
    #[error("transport failure: {0:#}")]
    Transport(anyhow::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
