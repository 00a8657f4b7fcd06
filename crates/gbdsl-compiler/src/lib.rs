//! gbdsl compiler: orchestrates the generation pipeline.
//!
//! ```text
//! Game config + recorded IR → symbols → preamble → validation → sections → C source
//! ```
//!
//! [`Generator`] owns the run; subsystem compilers live in `gbdsl-lower`,
//! and caller-supplied [`SectionEmitter`]s fill the sections the built-in
//! compilers leave empty (palettes, tiles, audio, dialog, menus, ...).

pub mod error;
pub mod generator;

pub use error::{GenerateError, GenerateResult};
pub use generator::{fingerprint, generate, GenerateOptions, Generated, Generator};
pub use gbdsl_lower::{Section, SectionEmitter};
