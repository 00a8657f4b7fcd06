//! Cross-cutting validation.
//!
//! Every check here records a diagnostic and an inline marker instead of
//! failing, so one run reports every problem in the configuration.

use std::collections::HashSet;

use gbdsl_ir::game::MAX_ENTITIES;
use gbdsl_ir::DiagnosticCode;
use tracing::debug;

use crate::context::LowerContext;
use crate::section::Section;

/// Longest timeline the 16-bit frame counter can step through.
const MAX_TIMELINE_FRAMES: u32 = u16::MAX as u32;

pub fn run(ctx: &mut LowerContext<'_>) {
    let before = ctx.diagnostics.total_errors;
    check_scenes(ctx);
    check_names(ctx);
    check_entities(ctx);
    check_physics(ctx);
    check_navigation(ctx);
    check_cutscenes(ctx);
    debug!(
        errors = ctx.diagnostics.total_errors - before,
        "configuration validated"
    );
}

fn check_scenes(ctx: &mut LowerContext<'_>) {
    let game = ctx.game;
    ctx.enter_section(Section::SceneEnum);
    if game.scenes.is_empty() {
        ctx.error(DiagnosticCode::NO_SCENES, "the game declares no scenes", None);
    }
    if let Some(initial) = &game.initial_scene {
        if game.scene(initial).is_none() {
            ctx.error(
                DiagnosticCode::UNKNOWN_INITIAL_SCENE,
                format!("initial scene '{initial}' is not declared"),
                None,
            );
        }
    }
}

fn check_names(ctx: &mut LowerContext<'_>) {
    let game = ctx.game;
    ctx.enter_section(Section::Variables);
    let globals = game
        .variables
        .iter()
        .map(|v| v.name.as_str())
        .chain(game.arrays.iter().map(|a| a.name.as_str()));
    report_duplicates(ctx, "variable", globals);
    report_duplicates(ctx, "scene", game.scenes.iter().map(|s| s.name.as_str()));
    report_duplicates(ctx, "entity", game.entities.iter().map(|e| e.name.as_str()));
    report_duplicates(ctx, "pool", game.pools.iter().map(|p| p.name.as_str()));
    report_duplicates(
        ctx,
        "state machine",
        game.state_machines.iter().map(|m| m.name.as_str()),
    );
    for sm in &game.state_machines {
        report_duplicates(ctx, "state", sm.states.iter().map(|s| s.name.as_str()));
    }
    report_duplicates(ctx, "cutscene", game.cutscenes.iter().map(|c| c.name.as_str()));
    report_duplicates(
        ctx,
        "navigation grid",
        game.nav_grids.iter().map(|g| g.name.as_str()),
    );
}

fn report_duplicates<'n>(ctx: &mut LowerContext<'_>, kind: &str, names: impl Iterator<Item = &'n str>) {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for name in names {
        if !seen.insert(name) && reported.insert(name) {
            ctx.error(
                DiagnosticCode::DUPLICATE_NAME,
                format!("duplicate {kind} name '{name}'"),
                None,
            );
        }
    }
}

fn check_entities(ctx: &mut LowerContext<'_>) {
    let (game, symbols) = (ctx.game, ctx.symbols);
    ctx.enter_section(Section::PoolData);
    for pool in &game.pools {
        if game.entity(&pool.entity).is_none() {
            ctx.error(
                DiagnosticCode::UNKNOWN_ENTITY,
                format!("pool '{}' spawns unknown entity '{}'", pool.name, pool.entity),
                None,
            );
        }
    }
    if symbols.instance_count() > MAX_ENTITIES {
        ctx.error(
            DiagnosticCode::ENTITY_LIMIT_EXCEEDED,
            format!(
                "{} entity instances exceed the limit of {MAX_ENTITIES}",
                symbols.instance_count()
            ),
            None,
        );
    }
}

fn check_physics(ctx: &mut LowerContext<'_>) {
    let (game, symbols) = (ctx.game, ctx.symbols);
    let Some(world) = &game.physics else {
        return;
    };
    ctx.enter_section(Section::PhysicsFunctions);
    for body in &world.bodies {
        if game.entity(&body.entity).is_none() {
            ctx.error(
                DiagnosticCode::UNKNOWN_ENTITY,
                format!("physics body for unknown entity '{}'", body.entity),
                None,
            );
        } else if symbols.instances_of(&body.entity).is_empty() {
            ctx.error(
                DiagnosticCode::BODY_WITHOUT_INSTANCES,
                format!("physics body '{}' has no instances", body.entity),
                None,
            );
        }
    }
    for pair in &world.collisions {
        for tag in [&pair.tag_a, &pair.tag_b] {
            if !symbols.has_tag(tag) {
                ctx.error(
                    DiagnosticCode::TAG_WITHOUT_ENTITIES,
                    format!(
                        "collision pair '{}'/'{}': no entity is tagged '{tag}'",
                        pair.tag_a, pair.tag_b
                    ),
                    None,
                );
            }
        }
    }
}

fn check_navigation(ctx: &mut LowerContext<'_>) {
    let game = ctx.game;
    ctx.enter_section(Section::Navigation);
    for def in &game.nav_grids {
        if def.grid.walkable_count() == 0 {
            ctx.error(
                DiagnosticCode::GRID_NOT_WALKABLE,
                format!("navigation grid '{}' has no walkable tile", def.name),
                None,
            );
        }
    }
}

fn check_cutscenes(ctx: &mut LowerContext<'_>) {
    let game = ctx.game;
    ctx.enter_section(Section::CutsceneFunctions);
    for cs in &game.cutscenes {
        let frames = cs.duration();
        if frames > MAX_TIMELINE_FRAMES {
            ctx.error(
                DiagnosticCode::TIMELINE_TOO_LONG,
                format!(
                    "cutscene '{}' lasts {frames} frames, at most {MAX_TIMELINE_FRAMES} are supported",
                    cs.name
                ),
                None,
            );
        }
    }
}
