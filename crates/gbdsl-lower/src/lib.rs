//! gbdsl lowering engine: turns recorded IR and the game configuration into
//! GBDK-style C for the Game Boy.
//!
//! # Architecture
//!
//! Lowering runs section by section over one shared [`LowerContext`]:
//!
//! - [`fold`] simplifies expressions in the numeric domain of their
//!   destination (wraparound, identities, strength reduction).
//! - [`emit`] prints expressions with the minimum parentheses C needs.
//! - [`stmt`] lowers statements, checks array subscripts and records
//!   source-map entries.
//! - [`subsystems`] compile each part of the game (entities, scenes, state
//!   machines, physics, navigation, save data, cutscenes) into the
//!   [`Section`] it owns.
//!
//! Hard errors stop lowering with a [`LowerError`]. Validation problems are
//! collected on the context as diagnostics, with an inline
//! `/* error Vnnn: ... */` marker at the point of discovery.

pub mod context;
pub mod emit;
pub mod error;
pub mod fold;
pub mod section;
pub mod source_map;
pub mod stmt;
pub mod subsystems;
pub mod symbols;
pub mod writer;

pub use context::{LowerContext, LowerOptions};
pub use emit::emit_expr;
pub use error::{LowerError, LowerResult};
pub use fold::Folder;
pub use section::{Section, SectionEmitter};
pub use source_map::{SourceMap, SourceMapEntry};
pub use symbols::SymbolTable;
pub use writer::CodeWriter;
