//! Generation error types.

use gbdsl_ir::Diagnostics;
use gbdsl_lower::LowerError;
use thiserror::Error;

/// Errors that end a generation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    /// A programmer or configuration error that stopped lowering.
    #[error(transparent)]
    Lower(#[from] LowerError),

    /// Every validation error collected in a strict run.
    #[error("{0}")]
    Validation(Diagnostics),
}

impl GenerateError {
    /// The collected diagnostics, for a validation failure.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            GenerateError::Validation(d) => Some(d),
            GenerateError::Lower(_) => None,
        }
    }
}

/// Generation result type alias.
pub type GenerateResult<T> = Result<T, GenerateError>;
