use crate::SourceLocation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Diagnostic category, determined by code range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticCategory {
    Reference,
    Naming,
    Physics,
    Navigation,
    Resource,
}

/// Numeric validation code (V100–V599).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DiagnosticCode(pub u16);

impl DiagnosticCode {
    // ── Reference errors (V100–V199) ──
    pub const UNKNOWN_SCENE: Self = Self(100);
    pub const UNKNOWN_ENTITY: Self = Self(101);
    pub const UNKNOWN_INITIAL_SCENE: Self = Self(102);
    pub const NO_SCENES: Self = Self(103);

    // ── Naming errors (V200–V299) ──
    pub const DUPLICATE_NAME: Self = Self(200);

    // ── Physics errors (V300–V399) ──
    pub const TAG_WITHOUT_ENTITIES: Self = Self(300);
    pub const BODY_WITHOUT_INSTANCES: Self = Self(301);

    // ── Navigation errors (V400–V499) ──
    pub const GRID_NOT_WALKABLE: Self = Self(400);

    // ── Resource errors (V500–V599) ──
    pub const ENTITY_LIMIT_EXCEEDED: Self = Self(500);
    pub const TIMELINE_TOO_LONG: Self = Self(501);

    /// Get the category for this code.
    pub fn category(self) -> DiagnosticCategory {
        match self.0 {
            100..=199 => DiagnosticCategory::Reference,
            200..=299 => DiagnosticCategory::Naming,
            300..=399 => DiagnosticCategory::Physics,
            400..=499 => DiagnosticCategory::Navigation,
            _ => DiagnosticCategory::Resource,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.0)
    }
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Naming => write!(f, "naming"),
            Self::Physics => write!(f, "physics"),
            Self::Navigation => write!(f, "navigation"),
            Self::Resource => write!(f, "resource"),
        }
    }
}

/// A generation-time validation problem.
///
/// These are collected while walking the configuration, annotated inline in
/// the generated output, and surfaced together at the end of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub severity: Severity,
    pub category: DiagnosticCategory,
    /// The section that discovered the problem (e.g. "physics").
    pub section: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn new(code: DiagnosticCode, section: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            category: code.category(),
            section: section.into(),
            message: message.into(),
            location: None,
        }
    }

    /// Attach the authoring location that caused the problem.
    pub fn with_location(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    /// Downgrade to a warning.
    pub fn into_warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{loc}: ")?;
        }
        write!(
            f,
            "{} [{}/{}] {}",
            self.code, self.category, self.section, self.message
        )
    }
}

/// Accumulated diagnostics of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub total_errors: usize,
    pub total_warnings: usize,
}

impl Diagnostics {
    /// Create an empty collection.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        self.total_errors > 0
    }

    pub fn push_error(&mut self, diagnostic: Diagnostic) {
        self.errors.push(diagnostic);
        self.total_errors += 1;
    }

    pub fn push_warning(&mut self, diagnostic: Diagnostic) {
        self.warnings.push(diagnostic.into_warning());
        self.total_warnings += 1;
    }

    /// Move every error into the warning list.
    pub fn downgrade_errors(&mut self) {
        for err in std::mem::take(&mut self.errors) {
            self.push_warning(err);
        }
        self.total_errors = 0;
    }

    /// Forget everything collected so far.
    pub fn clear(&mut self) {
        *self = Self::empty();
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.total_errors)?;
        for err in &self.errors {
            write!(f, "\n  {err}")?;
        }
        Ok(())
    }
}
