//! Error types for the carve model layer.

use thiserror::Error;

/// Main error type for model-document operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A structural problem with the model document.
    #[error("model error: {0}")]
    Model(String),

    /// A variable index that does not exist in the document.
    #[error("variable index out of range: {0}")]
    VariableIndex(usize),

    /// A constraint index that does not exist in the document.
    #[error("constraint index out of range: {0}")]
    ConstraintIndex(usize),

    /// An interval index that does not exist in the document.
    #[error("interval index out of range: {0}")]
    IntervalIndex(usize),
}

/// Result type alias for model-document operations.
pub type Result<T> = std::result::Result<T, CoreError>;
