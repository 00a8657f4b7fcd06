//! Screen transitions driven through the background palette register.
//!
//! Emitted only when some cutscene plays a transition.

use gbdsl_ir::game::{TimelineStep, TransitionEffect};
use gbdsl_ir::Game;

use crate::context::LowerContext;
use crate::error::LowerResult;

/// BGP values from normal (`0xE4`) to all white.
pub const FADE_LEVELS: [u8; 4] = [0xE4, 0x90, 0x40, 0x00];

const EFFECTS: [TransitionEffect; 3] = [
    TransitionEffect::FadeOut,
    TransitionEffect::FadeIn,
    TransitionEffect::Flash,
];

pub fn effect_const(effect: TransitionEffect) -> &'static str {
    match effect {
        TransitionEffect::FadeOut => "TRANSITION_FADE_OUT",
        TransitionEffect::FadeIn => "TRANSITION_FADE_IN",
        TransitionEffect::Flash => "TRANSITION_FLASH",
    }
}

/// True if any cutscene plays a transition.
pub fn is_used(game: &Game) -> bool {
    fn any(steps: &[TimelineStep]) -> bool {
        steps.iter().any(|s| match s {
            TimelineStep::Transition { .. } => true,
            TimelineStep::Parallel(branches) => branches.iter().any(|b| any(b)),
            _ => false,
        })
    }
    game.cutscenes.iter().any(|c| any(&c.steps))
}

/// Palette register value `elapsed` frames into an effect lasting
/// `frames` frames. Mirrors `transition_step`.
pub fn palette_at(effect: TransitionEffect, elapsed: u8, frames: u8) -> u8 {
    let frames = frames.max(1) as u16;
    let level = ((elapsed as u16 * 4) / frames).min(3) as usize;
    match effect {
        TransitionEffect::FadeOut => FADE_LEVELS[level],
        TransitionEffect::FadeIn => FADE_LEVELS[3 - level],
        TransitionEffect::Flash if elapsed & 4 != 0 => FADE_LEVELS[3],
        TransitionEffect::Flash => FADE_LEVELS[0],
    }
}

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    if !is_used(ctx.game) {
        return Vec::new();
    }
    vec![
        "void transition_start(uint8_t effect, uint8_t frames);".to_string(),
        "void transition_step(void);".to_string(),
    ]
}

pub fn emit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    if !is_used(ctx.game) {
        return Ok(());
    }
    ctx.banner();
    for (i, effect) in EFFECTS.iter().enumerate() {
        ctx.out
            .line(format!("#define {} {i}", effect_const(*effect)));
    }
    let levels: Vec<String> = FADE_LEVELS.iter().map(|l| format!("0x{l:02X}")).collect();
    ctx.out.line(format!(
        "static const uint8_t fade_levels[4] = {{{}}};",
        levels.join(", ")
    ));
    ctx.out.line("uint8_t transition_effect;");
    ctx.out.line("uint8_t transition_frames;");
    ctx.out.line("uint8_t transition_elapsed;");
    ctx.out.line("uint8_t transition_active;");
    ctx.out.blank();

    ctx.function(
        "transition_start",
        "void transition_start(uint8_t effect, uint8_t frames)",
        |ctx| {
            ctx.out.line("transition_effect = effect;");
            ctx.out.line("transition_frames = frames ? frames : 1;");
            ctx.out.line("transition_elapsed = 0;");
            ctx.out.line("transition_active = 1;");
            Ok(())
        },
    )?;

    ctx.function("transition_step", "void transition_step(void)", |ctx| {
        ctx.out.line("uint8_t level;");
        ctx.out.line("if (!transition_active) return;");
        ctx.out.line(
            "level = (uint8_t)(((uint16_t)transition_elapsed * 4) / transition_frames);",
        );
        ctx.out.line("if (level > 3) level = 3;");
        ctx.out.open("switch (transition_effect)");
        ctx.out.line("case TRANSITION_FADE_OUT:");
        ctx.out.indent();
        ctx.out.line("BGP_REG = fade_levels[level];");
        ctx.out.line("break;");
        ctx.out.dedent();
        ctx.out.line("case TRANSITION_FADE_IN:");
        ctx.out.indent();
        ctx.out.line("BGP_REG = fade_levels[3 - level];");
        ctx.out.line("break;");
        ctx.out.dedent();
        ctx.out.line("default:");
        ctx.out.indent();
        ctx.out
            .line("BGP_REG = (transition_elapsed & 4) ? fade_levels[3] : fade_levels[0];");
        ctx.out.line("break;");
        ctx.out.dedent();
        ctx.out.close();
        ctx.out.open("if (++transition_elapsed >= transition_frames)");
        ctx.out.line("transition_active = 0;");
        ctx.out.line(
            "BGP_REG = transition_effect == TRANSITION_FADE_OUT ? fade_levels[3] : fade_levels[0];",
        );
        ctx.out.close();
        Ok(())
    })
}
