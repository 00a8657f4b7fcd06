//! Shared types for the gbdsl compiler.
//!
//! This crate defines the IR node types, source locations, the recording
//! engine that builds IR from authoring calls, the game data model consumed
//! by the lowering engine, and the error and diagnostic types shared by every
//! later stage.

mod diagnostic;
mod error;
mod location;

pub mod expr;
pub mod fixed;
pub mod game;
pub mod logic;
pub mod nav;
pub mod physics;
pub mod record;
pub mod save;
pub mod stmt;

pub use diagnostic::{Diagnostic, DiagnosticCategory, DiagnosticCode, Diagnostics, Severity};
pub use error::IrError;
pub use expr::{BinOp, Expr, Literal, NumericDomain, Precedence, UnaryOp};
pub use fixed::Fixed;
pub use game::Game;
pub use location::SourceLocation;
pub use logic::{LogicBlock, Substitutions};
pub use record::{Recorder, StatementSink};
pub use stmt::{AssignOp, Stmt, StmtKind};

/// Result type used throughout the gbdsl IR layer.
pub type Result<T> = std::result::Result<T, IrError>;
