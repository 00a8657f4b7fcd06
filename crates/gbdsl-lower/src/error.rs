//! Lowering error types.

use gbdsl_ir::IrError;
use thiserror::Error;

/// Errors that stop lowering immediately.
///
/// Problems that can be reported alongside others (an unknown scene in a
/// `change_scene`, a collision tag nobody carries) are not errors here; they
/// are collected as diagnostics on the lowering context instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LowerError {
    /// An authoring or configuration error surfaced while lowering.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// A literal index outside a declared array.
    #[error("index {index} out of bounds for array '{array}' of length {len}")]
    IndexOutOfBounds { array: String, index: i32, len: u16 },

    /// A hard target limit was exceeded.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// An externally registered section failed.
    #[error("section '{section}' failed: {message}")]
    External { section: String, message: String },
}

/// Lowering result type alias.
pub type LowerResult<T> = Result<T, LowerError>;
