//! Cutscene timelines compiled to frame-stepped switches.
//!
//! Timelines are flattened at compile time: every `Run` and `Transition`
//! step gets the frame it fires on, parallel branches all start at the
//! group's offset, and the group lasts as long as its longest branch. The
//! generated step routine then only has to switch on the frame counter.

use gbdsl_ir::game::{Cutscene, TimelineStep, TransitionEffect};
use gbdsl_ir::Stmt;
use tracing::debug;

use super::transition::effect_const;
use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::stmt::lower_block;
use crate::symbols::c_ident;

/// Something that happens on a given frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue<'a> {
    Run(&'a [Stmt]),
    Transition { effect: TransitionEffect, frames: u8 },
}

/// Every cue of `cutscene` with its frame, ordered by frame. Cues on the
/// same frame keep their declaration order.
pub fn schedule(cutscene: &Cutscene) -> Vec<(u32, Cue<'_>)> {
    let mut cues = Vec::new();
    place(&cutscene.steps, 0, &mut cues);
    cues.sort_by_key(|(frame, _)| *frame);
    cues
}

/// Schedule `steps` from `start`; returns the frame after the last step.
fn place<'a>(steps: &'a [TimelineStep], start: u32, cues: &mut Vec<(u32, Cue<'a>)>) -> u32 {
    let mut at = start;
    for step in steps {
        match step {
            TimelineStep::Wait { frames } => at += *frames as u32,
            TimelineStep::Run(stmts) => cues.push((at, Cue::Run(stmts))),
            TimelineStep::Transition { effect, frames } => {
                cues.push((
                    at,
                    Cue::Transition {
                        effect: *effect,
                        frames: *frames,
                    },
                ));
                at += *frames as u32;
            }
            TimelineStep::Parallel(branches) => {
                let end = branches
                    .iter()
                    .map(|b| place(b, at, cues))
                    .max()
                    .unwrap_or(at);
                at = end;
            }
        }
    }
    at
}

pub fn step_name(cutscene: &str) -> String {
    format!("cutscene_{}_step", c_ident(cutscene))
}

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    ctx.game
        .cutscenes
        .iter()
        .flat_map(|cs| {
            [
                format!("void cutscene_{}_start(void);", c_ident(&cs.name)),
                format!("void {}(void);", step_name(&cs.name)),
            ]
        })
        .collect()
}

pub fn emit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let game = ctx.game;
    if game.cutscenes.is_empty() {
        return Ok(());
    }
    ctx.banner();
    for cs in &game.cutscenes {
        emit_cutscene(ctx, cs)?;
    }
    Ok(())
}

fn emit_cutscene(ctx: &mut LowerContext<'_>, cs: &Cutscene) -> LowerResult<()> {
    let name = c_ident(&cs.name);
    let frame = format!("cutscene_{name}_frame");
    let active = format!("cutscene_{name}_active");
    let cues = schedule(cs);
    let duration = cs.duration();

    ctx.out.line(format!("uint16_t {frame};"));
    ctx.out.line(format!("uint8_t {active};"));
    ctx.out.blank();

    ctx.function(
        &format!("cutscene_{name}_start"),
        &format!("void cutscene_{name}_start(void)"),
        |ctx| {
            ctx.out.line(format!("{frame} = 0;"));
            ctx.out.line(format!("{active} = 1;"));
            Ok(())
        },
    )?;

    let step = step_name(&cs.name);
    ctx.function(&step, &format!("void {step}(void)"), |ctx| {
        ctx.out.line(format!("if (!{active}) return;"));
        if !cues.is_empty() {
            ctx.out.open(format!("switch ({frame})"));
            let mut i = 0;
            while i < cues.len() {
                let at = cues[i].0;
                ctx.out.line(format!("case {at}:"));
                ctx.out.indent();
                while i < cues.len() && cues[i].0 == at {
                    match cues[i].1 {
                        Cue::Run(stmts) => lower_block(ctx, stmts)?,
                        Cue::Transition { effect, frames } => ctx.out.line(format!(
                            "transition_start({}, {frames});",
                            effect_const(effect)
                        )),
                    }
                    i += 1;
                }
                ctx.out.line("break;");
                ctx.out.dedent();
            }
            ctx.out.line("default:");
            ctx.out.indent();
            ctx.out.line("break;");
            ctx.out.dedent();
            ctx.out.close();
        }
        ctx.out.open(format!("if ({frame} >= {duration})"));
        ctx.out.line(format!("{active} = 0;"));
        ctx.out.reopen("} else {");
        ctx.out.line(format!("{frame}++;"));
        ctx.out.close();
        Ok(())
    })?;

    debug!(cutscene = %cs.name, cues = cues.len(), duration, "cutscene scheduled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LowerOptions;
    use crate::symbols::SymbolTable;
    use gbdsl_ir::Game;

    fn run(text: &str) -> TimelineStep {
        TimelineStep::Run(vec![Stmt::raw(text)])
    }

    fn intro() -> Cutscene {
        Cutscene::new(
            "intro",
            vec![
                run("a();"),
                TimelineStep::Wait { frames: 10 },
                TimelineStep::Parallel(vec![
                    vec![TimelineStep::Wait { frames: 5 }, run("b();")],
                    vec![run("c();"), TimelineStep::Wait { frames: 20 }],
                ]),
                TimelineStep::Transition {
                    effect: TransitionEffect::FadeOut,
                    frames: 8,
                },
                run("d();"),
            ],
        )
    }

    fn frames(cs: &Cutscene) -> Vec<u32> {
        schedule(cs).into_iter().map(|(f, _)| f).collect()
    }

    #[test]
    fn test_parallel_branches_share_offset() {
        let cs = intro();
        // a@0, c@10, b@15, fade@30, d@38
        assert_eq!(frames(&cs), vec![0, 10, 15, 30, 38]);
        assert_eq!(cs.duration(), 38);
    }

    #[test]
    fn test_same_frame_keeps_declaration_order() {
        let cs = Cutscene::new(
            "x",
            vec![TimelineStep::Parallel(vec![vec![run("first();")], vec![run("second();")]])],
        );
        let cues = schedule(&cs);
        assert_eq!(cues.len(), 2);
        assert!(matches!(cues[0].1, Cue::Run(s) if s == [Stmt::raw("first();")]));
    }

    #[test]
    fn test_step_routine() {
        let game = Game::new("t").with_cutscene(intro());
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        emit(&mut ctx).unwrap();
        let out = ctx.out.finish();
        assert!(out.contains("uint16_t cutscene_intro_frame;"));
        assert!(out.contains("        case 30:\n            transition_start(TRANSITION_FADE_OUT, 8);\n            break;"));
        assert!(out.contains("    if (cutscene_intro_frame >= 38) {\n        cutscene_intro_active = 0;\n    } else {\n        cutscene_intro_frame++;\n    }"));
    }

    #[test]
    fn test_schedule_is_deterministic() {
        let cs = intro();
        let first = frames(&cs);
        for _ in 0..100 {
            assert_eq!(frames(&cs), first);
        }
    }
}
