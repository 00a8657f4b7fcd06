//! Per-run lowering state shared by every subsystem compiler.

use gbdsl_ir::{Diagnostic, DiagnosticCode, Diagnostics, Game, NumericDomain, SourceLocation};
use serde::{Deserialize, Serialize};

use crate::fold::Folder;
use crate::section::Section;
use crate::source_map::SourceMap;
use crate::symbols::SymbolTable;
use crate::writer::CodeWriter;
use crate::LowerResult;

/// Knobs that change what the lowering engine emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowerOptions {
    /// Default numeric domain for folding when a target's type is unknown.
    pub domain: NumericDomain,
    /// Wrap dynamic array indices in `BOUNDS_CHECK`.
    pub bounds_checks: bool,
    /// Record source-map entries.
    pub source_map: bool,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self {
            domain: NumericDomain::U8,
            bounds_checks: true,
            source_map: true,
        }
    }
}

/// Everything one generation run writes to or reads from.
pub struct LowerContext<'a> {
    pub game: &'a Game,
    pub symbols: &'a SymbolTable,
    pub options: LowerOptions,
    pub out: CodeWriter,
    pub diagnostics: Diagnostics,
    pub source_map: SourceMap,
    section: Section,
    current_fn: Option<String>,
}

impl<'a> LowerContext<'a> {
    pub fn new(game: &'a Game, symbols: &'a SymbolTable, options: LowerOptions) -> Self {
        Self {
            game,
            symbols,
            options,
            out: CodeWriter::new(),
            diagnostics: Diagnostics::empty(),
            source_map: SourceMap::new(),
            section: Section::PaletteData,
            current_fn: None,
        }
    }

    /// A folder for values stored into `domain`.
    pub fn folder(&self, domain: NumericDomain) -> Folder<'a> {
        let symbols: &'a SymbolTable = self.symbols;
        Folder::new(domain).with_vars(&symbols.domains)
    }

    // ── Sections & functions ─────────────────────────────────────────────

    pub fn enter_section(&mut self, section: Section) {
        self.section = section;
    }

    pub fn section(&self) -> Section {
        self.section
    }

    /// Write the banner comment that opens a non-empty section.
    pub fn banner(&mut self) {
        self.out
            .line(format!("/* ==== {} ==== */", self.section.name()));
        self.out.blank();
    }

    /// Emit `signature { body }` and attribute source-map entries inside it
    /// to `name`.
    pub fn function<F>(&mut self, name: &str, signature: &str, body: F) -> LowerResult<()>
    where
        F: FnOnce(&mut Self) -> LowerResult<()>,
    {
        let outer = self.current_fn.replace(name.to_string());
        self.out.open(signature);
        let result = body(self);
        self.out.close();
        self.out.blank();
        self.current_fn = outer;
        result
    }

    pub fn current_function(&self) -> Option<&str> {
        self.current_fn.as_deref()
    }

    // ── Source map & diagnostics ─────────────────────────────────────────

    /// Map the next emitted line back to `location`.
    pub fn mark(&mut self, location: Option<&SourceLocation>) {
        if !self.options.source_map {
            return;
        }
        if let Some(loc) = location {
            let line = self.out.current_line();
            self.source_map
                .push(line, loc, self.current_fn.as_deref());
        }
    }

    /// Record a validation error and annotate the output at this point.
    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, location: Option<&SourceLocation>) {
        let message = message.into();
        self.out
            .line(format!("/* error {code}: {} */", message.replace("*/", "* /")));
        self.diagnostics.push_error(
            Diagnostic::new(code, self.section.name(), message).with_location(location.cloned()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_scopes_source_map_symbol() {
        let game = Game::new("t");
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        ctx.function("tick", "void tick(void)", |ctx| {
            ctx.mark(Some(&SourceLocation::new("game.rs", 3)));
            ctx.out.line("x++;");
            Ok(())
        })
        .unwrap();
        assert_eq!(ctx.current_function(), None);
        let entry = ctx.source_map.find_by_line(2).unwrap();
        assert_eq!(entry.symbol.as_deref(), Some("tick"));
        assert_eq!(entry.origin_line, 3);
    }

    #[test]
    fn test_error_is_annotated_inline() {
        let game = Game::new("t");
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        ctx.enter_section(Section::SceneFunctions);
        ctx.error(DiagnosticCode::UNKNOWN_SCENE, "unknown scene 'x'", None);
        assert!(ctx.out.as_str().contains("/* error V100: unknown scene 'x' */"));
        assert_eq!(ctx.diagnostics.total_errors, 1);
        assert_eq!(ctx.diagnostics.errors[0].section, "scene functions");
    }

    #[test]
    fn test_source_map_disabled() {
        let game = Game::new("t");
        let symbols = SymbolTable::build(&game);
        let options = LowerOptions {
            source_map: false,
            ..LowerOptions::default()
        };
        let mut ctx = LowerContext::new(&game, &symbols, options);
        ctx.mark(Some(&SourceLocation::new("game.rs", 3)));
        assert!(ctx.source_map.is_empty());
    }
}
