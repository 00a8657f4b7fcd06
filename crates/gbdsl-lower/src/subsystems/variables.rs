//! Scalar and array globals.

use gbdsl_ir::game::VarType;
use tracing::debug;

use crate::context::LowerContext;
use crate::error::LowerResult;
use crate::symbols::len_const;

pub fn emit(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let game = ctx.game;
    if game.variables.is_empty() && game.arrays.is_empty() {
        return Ok(());
    }
    ctx.banner();
    for v in &game.variables {
        ctx.out.line(format!(
            "{} {} = {};",
            v.ty.c_type(),
            v.name,
            initial_value(v.ty, v.init)
        ));
    }
    for a in &game.arrays {
        a.validate()?;
        let len = len_const(&a.name);
        let values: Vec<String> = (0..a.len as usize)
            .map(|i| initial_value(a.ty, a.init.get(i).copied().unwrap_or(0)).to_string())
            .collect();
        ctx.out.line(format!("#define {len} {}", a.len));
        ctx.out.line(format!(
            "{} {}[{len}] = {{{}}};",
            a.ty.c_type(),
            a.name,
            values.join(", ")
        ));
    }
    ctx.out.blank();
    debug!(
        scalars = game.variables.len(),
        arrays = game.arrays.len(),
        "variables emitted"
    );
    Ok(())
}

/// Initializer as stored by the target.
fn initial_value(ty: VarType, value: i32) -> i32 {
    match ty {
        VarType::Bool => (value != 0) as i32,
        _ => ty.domain().wrap(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LowerOptions;
    use crate::symbols::SymbolTable;
    use gbdsl_ir::Game;

    #[test]
    fn test_scalars_and_arrays() {
        let game = Game::new("t")
            .with_variable("score", VarType::U16, 0)
            .with_variable("alive", VarType::Bool, 7)
            .with_variable("wind", VarType::I8, 200)
            .with_array("hp", VarType::U8, 4, vec![3, 300]);
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        emit(&mut ctx).unwrap();
        let out = ctx.out.as_str();
        assert!(out.contains("uint16_t score = 0;\n"));
        assert!(out.contains("uint8_t alive = 1;\n"));
        assert!(out.contains("int8_t wind = -56;\n"));
        assert!(out.contains("#define HP_LEN 4\nuint8_t hp[HP_LEN] = {3, 44, 0, 0};\n"));
    }

    #[test]
    fn test_too_many_initializers_fails() {
        let game = Game::new("t").with_array("hp", VarType::U8, 1, vec![1, 2]);
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        assert!(emit(&mut ctx).is_err());
    }

    #[test]
    fn test_nothing_declared_writes_nothing() {
        let game = Game::new("t");
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        emit(&mut ctx).unwrap();
        assert!(ctx.out.as_str().is_empty());
    }
}
