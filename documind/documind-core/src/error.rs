//! Error taxonomy for the engine. Nothing here is fatal to the process; every
//! failure is scoped to the operation that raised it.

use crate::model::DocStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("record not found: {0}")]
    NotFound(Uuid),

    /// Action attempted outside the caller's resolved accessible set. Raised
    /// before any mutation, never after a partial one.
    #[error("forbidden")]
    Forbidden,

    #[error("invalid status transition from {from:?}")]
    InvalidTransition { from: DocStatus },

    /// Folder parenting across departments or users is rejected.
    #[error("folder scope mismatch")]
    ScopeMismatch,

    /// The physical transfer did not complete; the placeholder record has
    /// already been discarded.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// The generation backend erred mid-stream. `partial` holds whatever
    /// content already arrived; it is preserved, not discarded.
    #[error("generation failed: {message}")]
    Generation { message: String, partial: String },

    #[error("generation timed out after {secs}s")]
    Timeout { secs: u64, partial: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;
