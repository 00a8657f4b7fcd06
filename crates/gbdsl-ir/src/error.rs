//! Programmer errors raised while building IR and configuration.

use thiserror::Error;

/// Build-time errors. These indicate an authoring mistake and fail
/// immediately, before any code is generated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IrError {
    /// A statement was emitted while no recording block was active.
    #[error("no active recording context: statements can only be emitted inside a recorded block")]
    NoActiveRecordingContext,

    /// `otherwise` was used without a preceding conditional to extend.
    #[error("no conditional to extend: the last recorded statement is not an else-less `if`")]
    NoConditionalToExtend,

    /// A logic block was expanded with the wrong number of arguments.
    #[error("logic block '{block}' expects {expected} argument(s), found {found}")]
    ArityMismatch {
        block: String,
        expected: usize,
        found: usize,
    },

    /// A reference to a name that does not exist (state, field, ...).
    #[error("unknown {kind} '{name}'")]
    UnknownName { kind: &'static str, name: String },

    /// A configuration value outside its legal range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl IrError {
    pub fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownName {
            kind,
            name: name.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
