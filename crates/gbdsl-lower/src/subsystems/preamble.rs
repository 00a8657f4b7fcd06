//! File header: includes, the bounds-check macro and prototypes.
//!
//! Every generated function that other sections may call is prototyped
//! here, so function order never matters. Data order still does.

use crate::context::LowerContext;

pub fn emit(ctx: &mut LowerContext<'_>, prototypes: &[String]) {
    let name = ctx.game.name.replace("*/", "* /");
    ctx.out
        .line(format!("/* Generated by gbdsl from \"{name}\". Do not edit. */"));
    ctx.out.line("#include <gb/gb.h>");
    ctx.out.line("#include <stdint.h>");
    ctx.out.line("#include <string.h>");
    ctx.out.blank();

    ctx.out.line("#ifdef GBDSL_DEBUG");
    ctx.out.open("static void bounds_fail(void)");
    ctx.out.line("for (;;) wait_vbl_done();");
    ctx.out.close();
    ctx.out
        .line("#define BOUNDS_CHECK(i, len) ((i) < (len) ? (i) : (bounds_fail(), 0))");
    ctx.out.line("#else");
    ctx.out.line("#define BOUNDS_CHECK(i, len) (i)");
    ctx.out.line("#endif");
    ctx.out.blank();

    if !prototypes.is_empty() {
        for p in prototypes {
            ctx.out.line(p);
        }
        ctx.out.blank();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LowerOptions;
    use crate::symbols::SymbolTable;
    use gbdsl_ir::Game;

    #[test]
    fn test_preamble() {
        let game = Game::new("demo");
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        emit(&mut ctx, &["void physics_step(void);".to_string()]);
        let out = ctx.out.finish();
        assert!(out.starts_with("/* Generated by gbdsl from \"demo\". Do not edit. */\n#include <gb/gb.h>\n"));
        assert!(out.contains("#define BOUNDS_CHECK(i, len) (i)\n#endif\n"));
        assert!(out.ends_with("void physics_step(void);\n\n"));
    }
}
