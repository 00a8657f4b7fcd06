//! Scenes, scene switching and the entry point.
//!
//! `change_scene` only records the request; the switch happens at the end
//! of the frame in `scene_apply_pending`, so a frame handler always runs to
//! completion in the scene it started in.

use gbdsl_ir::game::SceneDef;
use gbdsl_ir::Stmt;
use tracing::debug;

use super::{cutscene, transition};
use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::stmt::lower_block;
use crate::symbols::{c_ident, scene_const};

/// Scene lifecycle hooks, in the order the dispatchers are emitted.
const HOOKS: [&str; 3] = ["enter", "frame", "exit"];

fn hook<'s>(scene: &'s SceneDef, name: &str) -> &'s [Stmt] {
    match name {
        "enter" => &scene.on_enter,
        "frame" => &scene.on_frame,
        _ => &scene.on_exit,
    }
}

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    let game = ctx.game;
    if game.scenes.is_empty() {
        return Vec::new();
    }
    let mut out = vec!["void change_scene(uint8_t s);".to_string()];
    for scene in &game.scenes {
        for h in HOOKS {
            if !hook(scene, h).is_empty() {
                out.push(format!("void scene_{}_{h}(void);", c_ident(&scene.name)));
            }
        }
    }
    out.push("void scene_enter(uint8_t s);".to_string());
    out.push("void scene_frame(void);".to_string());
    out.push("void scene_exit(uint8_t s);".to_string());
    out
}

// ══════════════════════════════════════════════════════════════════════════════
// Scene enum
// ══════════════════════════════════════════════════════════════════════════════

pub fn emit_enum(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let symbols = ctx.symbols;
    if symbols.scenes().is_empty() {
        return Ok(());
    }
    ctx.banner();
    let mut members: Vec<String> = symbols.scenes().iter().map(|s| scene_const(s)).collect();
    members.push("SCENE_COUNT".to_string());
    ctx.out.line(format!("enum {{ {} }};", members.join(", ")));
    ctx.out.line("uint8_t current_scene;");
    ctx.out.line("uint8_t next_scene;");
    ctx.out.line("uint8_t scene_pending;");
    ctx.out.blank();
    Ok(())
}

// ══════════════════════════════════════════════════════════════════════════════
// Scene functions
// ══════════════════════════════════════════════════════════════════════════════

pub fn emit_functions(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let game = ctx.game;
    if game.scenes.is_empty() {
        return Ok(());
    }
    ctx.banner();

    for scene in &game.scenes {
        let name = c_ident(&scene.name);
        for h in HOOKS {
            let body = hook(scene, h);
            if body.is_empty() {
                continue;
            }
            let func = format!("scene_{name}_{h}");
            ctx.function(&func, &format!("void {func}(void)"), |ctx| {
                lower_block(ctx, body)
            })?;
        }
    }

    ctx.function("change_scene", "void change_scene(uint8_t s)", |ctx| {
        ctx.out.line("next_scene = s;");
        ctx.out.line("scene_pending = 1;");
        Ok(())
    })?;

    emit_dispatch(ctx, "enter", "void scene_enter(uint8_t s)", "s")?;
    emit_dispatch(ctx, "frame", "void scene_frame(void)", "current_scene")?;
    emit_dispatch(ctx, "exit", "void scene_exit(uint8_t s)", "s")?;

    ctx.function(
        "scene_apply_pending",
        "static void scene_apply_pending(void)",
        |ctx| {
            ctx.out.line("if (!scene_pending) return;");
            ctx.out.line("scene_pending = 0;");
            ctx.out.line("scene_exit(current_scene);");
            ctx.out.line("current_scene = next_scene;");
            ctx.out.line("scene_enter(current_scene);");
            Ok(())
        },
    )?;
    debug!(scenes = game.scenes.len(), "scene functions emitted");
    Ok(())
}

fn emit_dispatch(ctx: &mut LowerContext<'_>, h: &str, signature: &str, selector: &str) -> LowerResult<()> {
    let game = ctx.game;
    ctx.function(&format!("scene_{h}"), signature, |ctx| {
        ctx.out.open(format!("switch ({selector})"));
        for scene in &game.scenes {
            if hook(scene, h).is_empty() {
                continue;
            }
            ctx.out.line(format!("case {}:", scene_const(&scene.name)));
            ctx.out.indent();
            ctx.out
                .line(format!("scene_{}_{h}();", c_ident(&scene.name)));
            ctx.out.line("break;");
            ctx.out.dedent();
        }
        ctx.out.line("default:");
        ctx.out.indent();
        ctx.out.line("break;");
        ctx.out.dedent();
        ctx.out.close();
        Ok(())
    })
}

// ══════════════════════════════════════════════════════════════════════════════
// Entry point
// ══════════════════════════════════════════════════════════════════════════════

/// `main`: enter the start scene, then run one frame per vblank.
pub fn emit_entry(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let (game, symbols) = (ctx.game, ctx.symbols);
    // An unknown initial scene is reported by validation; start in the
    // first scene so the output stays well-formed.
    let start = game
        .start_scene()
        .filter(|s| symbols.scene_index(s).is_some())
        .or_else(|| symbols.scenes().first().map(String::as_str));

    ctx.banner();
    ctx.function("main", "void main(void)", |ctx| {
        ctx.out.line("DISPLAY_ON;");
        if let Some(start) = start {
            ctx.out
                .line(format!("current_scene = {};", scene_const(start)));
            ctx.out.line("scene_enter(current_scene);");
        }
        for sm in &game.state_machines {
            ctx.out.line(format!("{}_init();", c_ident(&sm.name)));
        }
        ctx.out.open("while (1)");
        if start.is_some() {
            ctx.out.line("scene_frame();");
        }
        for sm in &game.state_machines {
            ctx.out.line(format!("{}_update();", c_ident(&sm.name)));
        }
        for cs in &game.cutscenes {
            ctx.out.line(format!("{}();", cutscene::step_name(&cs.name)));
        }
        if transition::is_used(game) {
            ctx.out.line("transition_step();");
        }
        if game.physics.is_some() {
            ctx.out.line("physics_step();");
        }
        if start.is_some() {
            ctx.out.line("scene_apply_pending();");
        }
        ctx.out.line("wait_vbl_done();");
        ctx.out.close();
        Ok(())
    })
}
