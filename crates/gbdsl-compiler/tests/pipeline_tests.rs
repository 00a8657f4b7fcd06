//! Integration tests for the full generation pipeline.
//!
//! Tests validate:
//! - Sections appear in their fixed order after the preamble
//! - Output is deterministic (same input → same bytes, same fingerprint)
//! - Validation errors are all reported in one run, then raised or
//!   downgraded depending on `strict`
//! - Programmer errors stop the run immediately
//! - Source-map entries resolve to the lowered statements
//! - External section emitters plug into their slot and the preamble

use gbdsl_compiler::{
    fingerprint, generate, GenerateError, GenerateOptions, Generated, Generator, Section,
    SectionEmitter,
};
use gbdsl_ir::game::{Cutscene, EntityDef, SceneDef, StateDef, StateMachineDef, TimelineStep, TransitionEffect, VarType};
use gbdsl_ir::nav::{Heuristic, NavGrid, NavGridDef, PathfinderConfig};
use gbdsl_ir::physics::{CollisionPair, PhysicsBody, PhysicsWorld};
use gbdsl_ir::save::{ChecksumKind, FieldType, SaveImage, SaveSchema};
use gbdsl_ir::{AssignOp, BinOp, DiagnosticCode, Expr, Fixed, Game, Recorder, Severity};
use gbdsl_lower::{CodeWriter, LowerError, LowerResult};

// ══════════════════════════════════════════════════════════════════════════════
// Helpers
// ══════════════════════════════════════════════════════════════════════════════

/// A small platformer touching every built-in subsystem.
fn platformer() -> Game {
    let mut rec = Recorder::new();
    let title_enter = rec
        .record(|r| r.call("cutscene_intro_start", vec![]))
        .unwrap();
    let title_frame = rec
        .record(|r| {
            r.when(
                Expr::binary(
                    Expr::binary(Expr::call("joypad", vec![]), BinOp::BitAnd, Expr::var("J_START")),
                    BinOp::Ne,
                    Expr::int(0),
                ),
                |r| r.change_scene("level"),
            )
        })
        .unwrap();
    let level_enter = rec.record(|r| r.assign("lives", 3)).unwrap();
    let level_frame = rec
        .record(|r| r.compound("score", AssignOp::Add, 1))
        .unwrap();
    let stomp = rec
        .record(|r| r.compound("lives", AssignOp::Sub, 1))
        .unwrap();
    let chase = rec
        .record(|r| r.assign_index("hp", Expr::var("target"), Expr::int(2)))
        .unwrap();

    let world = PhysicsWorld {
        gravity: Fixed(32),
        bounce: Fixed(128),
        bodies: vec![PhysicsBody::new("hero", 1), PhysicsBody::new("slime", 2)],
        collisions: vec![
            CollisionPair::solid("player", "ground"),
            CollisionPair::solid("enemy", "ground"),
            CollisionPair::trigger("player", "enemy", stomp),
        ],
        ..PhysicsWorld::default()
    };

    let save = SaveSchema::builder()
        .field("best", FieldType::U16, 0)
        .array("flags", FieldType::U8, 8, 0)
        .slots(2)
        .checksum(ChecksumKind::Crc8)
        .magic(*b"GBDS")
        .build()
        .unwrap();

    let ai = StateMachineDef::new("ai", "idle")
        .state(StateDef::new("idle"))
        .state(StateDef {
            on_update: chase,
            ..StateDef::new("chase")
        })
        .transition(
            "idle",
            "chase",
            Expr::binary(Expr::var("score"), BinOp::Gt, Expr::int(100)),
        );

    let intro = Cutscene::new(
        "intro",
        vec![
            TimelineStep::Transition {
                effect: TransitionEffect::FadeIn,
                frames: 16,
            },
            TimelineStep::Wait { frames: 30 },
            TimelineStep::Run(vec![gbdsl_ir::Stmt::assign("score", Expr::int(0))]),
        ],
    );

    Game::new("platformer")
        .with_variable("score", VarType::U16, 0)
        .with_variable("lives", VarType::U8, 3)
        .with_variable("target", VarType::U8, 0)
        .with_array("hp", VarType::U8, 4, vec![3, 3, 3, 3])
        .with_entity(EntityDef::new("hero", "player", 8, 8).at(16, 16))
        .with_entity(EntityDef::new("slime", "enemy", 8, 8).at(64, 16))
        .with_entity(EntityDef::new("floor", "ground", 160, 8).at(0, 128))
        .with_entity(EntityDef::new("coin", "pickup", 4, 4))
        .with_pool("coins", "coin", 4)
        .with_scene(SceneDef::new("title").on_enter(title_enter).on_frame(title_frame))
        .with_scene(SceneDef::new("level").on_enter(level_enter).on_frame(level_frame))
        .with_initial_scene("title")
        .with_state_machine(ai)
        .with_physics(world)
        .with_nav_grid(NavGridDef {
            name: "level".into(),
            grid: NavGrid::from_rows(&["....#...", ".##.#.#.", "......#.", "#.###...", "........"])
                .unwrap(),
            pathfinder: PathfinderConfig {
                diagonal: true,
                heuristic: Heuristic::Chebyshev,
                max_iterations: 128,
            },
        })
        .with_save(save)
        .with_cutscene(intro)
}

/// Two validation problems and nothing else wrong.
fn broken() -> Game {
    Game::new("broken")
        .with_scene(SceneDef::new("title"))
        .with_initial_scene("boss")
        .with_pool("ghosts", "ghost", 2)
}

fn banner(section: Section) -> String {
    format!("/* ==== {} ==== */", section.name())
}

fn lenient() -> GenerateOptions {
    GenerateOptions {
        strict: false,
        ..GenerateOptions::default()
    }
}

fn line_at(out: &Generated, line: u32) -> &str {
    out.source
        .lines()
        .nth(line as usize - 1)
        .map(str::trim)
        .unwrap_or_default()
}

struct Dialog;

impl SectionEmitter for Dialog {
    fn emit(&self, _game: &Game, out: &mut CodeWriter) -> LowerResult<()> {
        out.line("const char *const dialog_lines[] = { \"Hello!\" };");
        out.open("void dialog_show(uint8_t id)");
        out.line("(void)id;");
        out.close();
        Ok(())
    }

    fn prototypes(&self, _game: &Game) -> Vec<String> {
        vec!["void dialog_show(uint8_t id);".to_string()]
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Layout
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_sections_in_fixed_order() {
    let out = generate(&platformer()).unwrap();
    let positions: Vec<(Section, usize)> = Section::ORDER
        .iter()
        .filter_map(|s| out.source.find(&banner(*s)).map(|p| (*s, p)))
        .collect();
    for pair in positions.windows(2) {
        assert!(pair[0].1 < pair[1].1, "{} after {}", pair[0].0, pair[1].0);
    }
    let present: Vec<Section> = positions.iter().map(|(s, _)| *s).collect();
    for s in [
        Section::CollisionHelpers,
        Section::SaveData,
        Section::PoolData,
        Section::Variables,
        Section::StateMachineEnums,
        Section::SceneEnum,
        Section::PoolFunctions,
        Section::CutsceneFunctions,
        Section::StateMachineUpdate,
        Section::CameraTransition,
        Section::Navigation,
        Section::PhysicsFunctions,
        Section::SceneFunctions,
        Section::EntryPoint,
    ] {
        assert!(present.contains(&s), "missing section {s}");
    }
    // no emitter registered for external sections
    assert!(!present.contains(&Section::DialogData));
}

#[test]
fn test_preamble_prototypes_precede_sections() {
    let out = generate(&platformer()).unwrap();
    assert!(out.source.starts_with("/* Generated by gbdsl from \"platformer\". Do not edit. */\n"));
    let first_section = out.source.find("/* ==== ").unwrap();
    for proto in [
        "void physics_step(void);",
        "void change_scene(uint8_t s);",
        "void ai_update(void);",
        "void cutscene_intro_start(void);",
        "void save_commit(uint8_t slot);",
    ] {
        let at = out.source.find(proto).unwrap_or_else(|| panic!("no prototype {proto}"));
        assert!(at < first_section, "{proto} is not in the preamble");
    }
    assert!(out.source.find("#define BOUNDS_CHECK").unwrap() < first_section);
}

#[test]
fn test_main_loop_runs_every_subsystem() {
    let out = generate(&platformer()).unwrap();
    let entry = &out.source[out.source.find(&banner(Section::EntryPoint)).unwrap()..];
    let order = [
        "scene_frame();",
        "ai_update();",
        "cutscene_intro_step();",
        "transition_step();",
        "physics_step();",
        "scene_apply_pending();",
        "wait_vbl_done();",
    ];
    let at: Vec<usize> = order
        .iter()
        .map(|call| entry.find(call).unwrap_or_else(|| panic!("main loop lacks {call}")))
        .collect();
    assert!(at.windows(2).all(|w| w[0] < w[1]));
    assert!(entry.contains("current_scene = SCENE_TITLE;"));
}

#[test]
fn test_optional_subsystems_are_omitted() {
    let game = Game::new("tiny").with_scene(SceneDef::new("only"));
    let out = generate(&game).unwrap();
    for absent in ["physics_step", "astar_search", "save_commit", "transition_step", "aabb_overlap"] {
        assert!(!out.source.contains(absent), "unexpected {absent}");
    }
    assert!(out.source.contains("void main(void)"));
}

// ══════════════════════════════════════════════════════════════════════════════
// Determinism
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_deterministic_output_100_iterations() {
    let game = platformer();
    let first = generate(&game).unwrap();
    assert_eq!(first.fingerprint, fingerprint(&first.source));
    for i in 0..100 {
        let again = generate(&game).unwrap();
        assert_eq!(again.source, first.source, "iteration {i} differs");
        assert_eq!(again.fingerprint, first.fingerprint);
    }
}

#[test]
fn test_repeated_runs_on_one_generator_start_clean() {
    let game = broken();
    let mut gen = Generator::new(&game).with_options(lenient());
    let first = gen.generate().unwrap();
    let second = gen.generate().unwrap();
    assert_eq!(first, second);
    assert_eq!(gen.diagnostics().total_warnings, 2);
}

#[test]
fn test_json_round_trip_keeps_fingerprint() {
    let game = platformer();
    let copy = Game::from_json(&game.to_json().unwrap()).unwrap();
    assert_eq!(
        generate(&copy).unwrap().fingerprint,
        generate(&game).unwrap().fingerprint
    );
}

// ══════════════════════════════════════════════════════════════════════════════
// Validation
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_strict_run_raises_every_error_at_once() {
    let err = generate(&broken()).unwrap_err();
    let diagnostics = err.diagnostics().expect("validation failure");
    let codes: Vec<DiagnosticCode> = diagnostics.errors.iter().map(|d| d.code).collect();
    assert_eq!(
        codes,
        vec![DiagnosticCode::UNKNOWN_INITIAL_SCENE, DiagnosticCode::UNKNOWN_ENTITY]
    );
    assert_eq!(diagnostics.total_errors, 2);
    assert!(err.to_string().starts_with("2 validation error(s)"));
}

#[test]
fn test_lenient_run_downgrades_to_warnings() {
    let game = broken();
    let out = Generator::new(&game).with_options(lenient()).generate().unwrap();
    assert_eq!(out.warnings.len(), 2);
    assert!(out.warnings.iter().all(|w| w.severity == Severity::Warning));
    assert!(out
        .source
        .contains("/* error V102: initial scene 'boss' is not declared */"));
    assert!(out.source.contains("/* error V101: "));
    // falls back to the first scene
    assert!(out.source.contains("current_scene = SCENE_TITLE;"));
}

#[test]
fn test_unknown_scene_in_handler() {
    let mut rec = Recorder::new();
    let frame = rec.record(|r| r.change_scene("credits")).unwrap();
    let game = Game::new("t").with_scene(SceneDef::new("title").on_frame(frame));
    let err = generate(&game).unwrap_err();
    let d = &err.diagnostics().unwrap().errors[0];
    assert_eq!(d.code, DiagnosticCode::UNKNOWN_SCENE);
    assert_eq!(d.section, "scene functions");
    assert!(d.location.as_ref().unwrap().file.ends_with("pipeline_tests.rs"));
}

#[test]
fn test_literal_index_out_of_bounds_is_immediate() {
    let mut rec = Recorder::new();
    let frame = rec.record(|r| r.assign_index("hp", 4, 0)).unwrap();
    let game = Game::new("t")
        .with_array("hp", VarType::U8, 4, vec![])
        .with_scene(SceneDef::new("title").on_frame(frame));
    let err = Generator::new(&game).with_options(lenient()).generate().unwrap_err();
    assert_eq!(
        err,
        GenerateError::Lower(LowerError::IndexOutOfBounds {
            array: "hp".into(),
            index: 4,
            len: 4,
        })
    );
}

#[test]
fn test_unknown_state_is_immediate() {
    let game = Game::new("t")
        .with_scene(SceneDef::new("title"))
        .with_state_machine(StateMachineDef::new("ai", "sleep").state(StateDef::new("idle")));
    let err = Generator::new(&game).with_options(lenient()).generate().unwrap_err();
    assert!(matches!(err, GenerateError::Lower(LowerError::Ir(_))), "{err:?}");
}

// ══════════════════════════════════════════════════════════════════════════════
// Source map
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_source_map_points_at_lowered_statements() {
    let out = generate(&platformer()).unwrap();
    let map = out.source_map.as_ref().unwrap();
    let level_frame: Vec<_> = map
        .entries
        .iter()
        .filter(|e| e.symbol.as_deref() == Some("scene_level_frame"))
        .collect();
    assert_eq!(level_frame.len(), 1);
    assert_eq!(line_at(&out, level_frame[0].emitted_line), "score += 1;");

    let hit = map
        .entries
        .iter()
        .find(|e| e.symbol.as_deref() == Some("physics_collide"))
        .expect("on-hit statements are mapped");
    assert_eq!(line_at(&out, hit.emitted_line), "lives -= 1;");

    for e in &map.entries {
        assert!(e.origin_file.ends_with("pipeline_tests.rs"));
        assert!(e.emitted_line as usize <= out.source.lines().count());
    }
}

#[test]
fn test_dynamic_index_bounds_check_toggle() {
    let game = platformer();
    let checked = generate(&game).unwrap();
    assert!(checked.source.contains("hp[BOUNDS_CHECK(target, HP_LEN)] = 2;"));
    let opts = GenerateOptions {
        bounds_checks: false,
        ..GenerateOptions::default()
    };
    let unchecked = Generator::new(&game).with_options(opts).generate().unwrap();
    assert!(unchecked.source.contains("hp[target] = 2;"));
    assert_ne!(checked.fingerprint, unchecked.fingerprint);
}

// ══════════════════════════════════════════════════════════════════════════════
// External sections
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_external_emitter_fills_its_slot() {
    let game = platformer();
    let mut gen = Generator::new(&game);
    gen.register(Section::DialogData, Box::new(Dialog));
    let out = gen.generate().unwrap();

    let dialog = out.source.find(&banner(Section::DialogData)).unwrap();
    assert!(out.source.find(&banner(Section::SaveData)).unwrap() < dialog);
    assert!(dialog < out.source.find(&banner(Section::PoolData)).unwrap());
    assert!(out.source[dialog..].contains("void dialog_show(uint8_t id) {"));

    let proto = out.source.find("void dialog_show(uint8_t id);").unwrap();
    assert!(proto < out.source.find("/* ==== ").unwrap());
}

// ══════════════════════════════════════════════════════════════════════════════
// Save data
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_sealed_save_validates_and_corruption_fails() {
    let game = platformer();
    let schema = game.save.as_ref().unwrap();
    let mut image = SaveImage::new(schema);
    image.set("best", 1234).unwrap();
    image.set_element("flags", 3, 1).unwrap();
    image.seal();
    assert!(image.is_valid());
    assert_eq!(image.get("best").unwrap(), 1234);

    let at = schema.field("best").unwrap().offset as usize;
    image.bytes_mut()[at] ^= 0x01;
    assert!(!image.is_valid());

    let out = generate(&game).unwrap();
    assert!(out.source.contains(&format!("#define SAVE_SLOT_SIZE {}", schema.slot_size())));
    assert!(out.source.contains("uint16_t save_get_best(void)"));
}
