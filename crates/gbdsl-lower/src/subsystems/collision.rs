//! Axis-aligned overlap test shared by physics and game code.

use crate::context::LowerContext;
use crate::error::LowerResult;

const SIGNATURE: &str = "uint8_t aabb_overlap(int16_t ax, int16_t ay, uint8_t aw, uint8_t ah, \
                         int16_t bx, int16_t by, uint8_t bw, uint8_t bh)";

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    if ctx.game.physics.is_some() {
        vec![format!("{SIGNATURE};")]
    } else {
        Vec::new()
    }
}

pub fn emit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    if ctx.game.physics.is_none() {
        return Ok(());
    }
    ctx.banner();
    ctx.function("aabb_overlap", SIGNATURE, |ctx| {
        ctx.out.line("return ax < bx + bw && bx < ax + aw &&");
        ctx.out.line("       ay < by + bh && by < ay + ah;");
        Ok(())
    })
}

/// Host mirror of `aabb_overlap`.
pub fn aabb_overlap(a: (i16, i16, u8, u8), b: (i16, i16, u8, u8)) -> bool {
    let (ax, ay, aw, ah) = (a.0 as i32, a.1 as i32, a.2 as i32, a.3 as i32);
    let (bx, by, bw, bh) = (b.0 as i32, b.1 as i32, b.2 as i32, b.3 as i32);
    ax < bx + bw && bx < ax + aw && ay < by + bh && by < ay + ah
}
