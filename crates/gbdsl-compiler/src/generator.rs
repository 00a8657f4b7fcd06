//! The generation pipeline.
//!
//! One run:
//! 1. Resolve the symbol table
//! 2. Write the preamble with every cross-section prototype
//! 3. Validate the configuration (diagnostics + inline markers)
//! 4. Emit each section in order, built-in content first, then any
//!    registered emitter
//! 5. Raise or downgrade the collected diagnostics
//! 6. Fingerprint the source

use std::collections::BTreeMap;

use gbdsl_ir::{Diagnostic, Diagnostics, Game, NumericDomain};
use gbdsl_lower::subsystems::{self, preamble, validate};
use gbdsl_lower::{LowerContext, LowerError, LowerOptions, Section, SectionEmitter, SourceMap, SymbolTable};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{GenerateError, GenerateResult};

// ══════════════════════════════════════════════════════════════════════════════
// Options & output
// ══════════════════════════════════════════════════════════════════════════════

/// Caller-facing generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Fail the run on validation errors instead of downgrading them to
    /// warnings.
    pub strict: bool,
    /// Wrap dynamic array indices in `BOUNDS_CHECK`.
    pub bounds_checks: bool,
    /// Build a source map.
    pub source_map: bool,
    /// Folding domain for values whose destination type is unknown.
    pub domain: NumericDomain,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            strict: true,
            bounds_checks: true,
            source_map: true,
            domain: NumericDomain::U8,
        }
    }
}

impl GenerateOptions {
    fn lower_options(&self) -> LowerOptions {
        LowerOptions {
            domain: self.domain,
            bounds_checks: self.bounds_checks,
            source_map: self.source_map,
        }
    }
}

/// The product of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generated {
    /// The complete C source.
    pub source: String,
    /// Emitted line → authoring location; `None` when disabled.
    pub source_map: Option<SourceMap>,
    /// Validation errors downgraded in a non-strict run.
    pub warnings: Vec<Diagnostic>,
    /// SHA-256 of `source`, lower-case hex.
    pub fingerprint: String,
}

/// Lower-case hex SHA-256 of generated source text.
pub fn fingerprint(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ══════════════════════════════════════════════════════════════════════════════
// Generator
// ══════════════════════════════════════════════════════════════════════════════

/// Generates C source for one game configuration.
pub struct Generator<'a> {
    game: &'a Game,
    options: GenerateOptions,
    emitters: BTreeMap<Section, Box<dyn SectionEmitter + 'a>>,
    diagnostics: Diagnostics,
    source_map: SourceMap,
}

impl<'a> Generator<'a> {
    pub fn new(game: &'a Game) -> Self {
        Self {
            game,
            options: GenerateOptions::default(),
            emitters: BTreeMap::new(),
            diagnostics: Diagnostics::empty(),
            source_map: SourceMap::new(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    /// Register the emitter for `section`, replacing any earlier one. On a
    /// built-in section the emitter's output follows the built-in content.
    pub fn register(&mut self, section: Section, emitter: Box<dyn SectionEmitter + 'a>) -> &mut Self {
        self.emitters.insert(section, emitter);
        self
    }

    /// Diagnostics of the last run, including ones downgraded to warnings.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Source map of the last run.
    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Run the pipeline. Every call starts from a clean slate, so repeated
    /// calls on the same configuration produce identical output.
    pub fn generate(&mut self) -> GenerateResult<Generated> {
        self.diagnostics.clear();
        self.source_map.clear();

        let game = self.game;
        info!(game = %game.name, strict = self.options.strict, "generation started");

        let symbols = SymbolTable::build(game);
        let mut ctx = LowerContext::new(game, &symbols, self.options.lower_options());

        let mut prototypes = subsystems::prototypes(&ctx);
        for emitter in self.emitters.values() {
            prototypes.extend(emitter.prototypes(game));
        }
        preamble::emit(&mut ctx, &prototypes);

        validate::run(&mut ctx);

        for section in Section::ORDER {
            let before = ctx.out.line_count();
            ctx.enter_section(section);
            subsystems::emit_builtin(section, &mut ctx)?;
            if let Some(emitter) = self.emitters.get(&section) {
                if section.is_external() {
                    ctx.banner();
                }
                emitter
                    .emit(game, &mut ctx.out)
                    .map_err(|e| external_error(section, e))?;
                ctx.out.blank();
            }
            let lines = ctx.out.line_count() - before;
            if lines > 0 {
                debug!(section = %section, lines, "section emitted");
            }
        }

        self.diagnostics = std::mem::take(&mut ctx.diagnostics);
        self.source_map = std::mem::take(&mut ctx.source_map);
        let line_count = ctx.out.line_count();
        let source = ctx.out.finish();

        if self.diagnostics.has_errors() {
            if self.options.strict {
                warn!(
                    errors = self.diagnostics.total_errors,
                    "generation failed validation"
                );
                return Err(GenerateError::Validation(self.diagnostics.clone()));
            }
            self.diagnostics.downgrade_errors();
            for w in &self.diagnostics.warnings {
                warn!(code = %w.code, section = %w.section, "{}", w.message);
            }
        }

        let fingerprint = fingerprint(&source);
        info!(
            lines = line_count,
            warnings = self.diagnostics.total_warnings,
            fingerprint = %fingerprint,
            "generation finished"
        );
        Ok(Generated {
            source,
            source_map: self.options.source_map.then(|| self.source_map.clone()),
            warnings: self.diagnostics.warnings.clone(),
            fingerprint,
        })
    }
}

fn external_error(section: Section, err: LowerError) -> LowerError {
    match err {
        LowerError::External { .. } => err,
        other => LowerError::External {
            section: section.name().to_string(),
            message: other.to_string(),
        },
    }
}

/// Generate with default options and no external sections.
pub fn generate(game: &Game) -> GenerateResult<Generated> {
    Generator::new(game).generate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbdsl_ir::game::SceneDef;
    use gbdsl_lower::{CodeWriter, LowerResult};

    struct Palette;

    impl SectionEmitter for Palette {
        fn emit(&self, _game: &Game, out: &mut CodeWriter) -> LowerResult<()> {
            out.line("const uint8_t palette[4] = { 0, 1, 2, 3 };");
            Ok(())
        }
    }

    struct Broken;

    impl SectionEmitter for Broken {
        fn emit(&self, _game: &Game, _out: &mut CodeWriter) -> LowerResult<()> {
            Err(LowerError::LimitExceeded("font".into()))
        }
    }

    fn game() -> Game {
        Game::new("demo").with_scene(SceneDef::new("title"))
    }

    #[test]
    fn test_options_default_and_serde() {
        let opts = GenerateOptions::default();
        assert!(opts.strict && opts.bounds_checks && opts.source_map);
        assert_eq!(opts.domain, NumericDomain::U8);
        let partial: GenerateOptions = serde_json::from_str(r#"{"strict":false}"#).unwrap();
        assert!(!partial.strict);
        assert!(partial.bounds_checks);
    }

    #[test]
    fn test_fingerprint_is_sha256_hex() {
        assert_eq!(
            fingerprint(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_external_section_gets_banner() {
        let game = game();
        let mut gen = Generator::new(&game);
        gen.register(Section::PaletteData, Box::new(Palette));
        let out = gen.generate().unwrap();
        assert!(out
            .source
            .contains("/* ==== palette data ==== */\n\nconst uint8_t palette[4] = { 0, 1, 2, 3 };\n"));
    }

    #[test]
    fn test_emitter_failure_is_external_error() {
        let game = game();
        let mut gen = Generator::new(&game);
        gen.register(Section::DialogData, Box::new(Broken));
        let err = gen.generate().unwrap_err();
        assert_eq!(
            err,
            GenerateError::Lower(LowerError::External {
                section: "dialog data".into(),
                message: "limit exceeded: font".into(),
            })
        );
    }

    #[test]
    fn test_source_map_disabled() {
        let game = game();
        let opts = GenerateOptions {
            source_map: false,
            ..GenerateOptions::default()
        };
        let out = Generator::new(&game).with_options(opts).generate().unwrap();
        assert!(out.source_map.is_none());
    }
}
