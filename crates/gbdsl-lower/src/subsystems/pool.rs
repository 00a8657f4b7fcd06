//! Entity instance table and pools.
//!
//! Every instance lives in one struct-of-arrays table indexed by slot.
//! Static entities take the first slots in declaration order, then each
//! pool takes a contiguous run of `capacity` slots, initially inactive.

use tracing::debug;

use crate::context::LowerContext;
use crate::error::{LowerError, LowerResult};
use crate::symbols::{c_ident, tag_const, upper_ident, Instance};

/// Slot indices are `uint8_t` and `0xFF` means "no slot".
const MAX_SLOTS: usize = 0xFF;

pub fn prototypes(ctx: &LowerContext<'_>) -> Vec<String> {
    let mut out = Vec::new();
    for pool in &ctx.game.pools {
        if ctx.symbols.pool_range(&pool.name).is_none() {
            continue;
        }
        let name = c_ident(&pool.name);
        out.push(format!("uint8_t {name}_spawn(int16_t x, int16_t y);"));
        out.push(format!("void {name}_despawn(uint8_t i);"));
    }
    out
}

// ══════════════════════════════════════════════════════════════════════════════
// Data
// ══════════════════════════════════════════════════════════════════════════════

pub fn emit_data(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let symbols = ctx.symbols;
    let instances = symbols.instances();
    if instances.len() > MAX_SLOTS {
        return Err(LowerError::LimitExceeded(format!(
            "{} entity instances, at most {MAX_SLOTS} are addressable",
            instances.len()
        )));
    }
    if instances.is_empty() && symbols.tags().is_empty() {
        return Ok(());
    }
    ctx.banner();

    let mut tags: Vec<String> = symbols.tags().iter().map(|t| tag_const(t)).collect();
    tags.push("TAG_COUNT".to_string());
    ctx.out.line(format!("enum {{ {} }};", tags.join(", ")));
    if instances.is_empty() {
        ctx.out.blank();
        return Ok(());
    }
    ctx.out
        .line(format!("#define MAX_ENTITIES {}", instances.len()));
    for (slot, inst) in instances.iter().enumerate() {
        if inst.pool.is_none() {
            ctx.out
                .line(format!("#define ENT_{} {slot}", upper_ident(&inst.entity)));
        }
    }
    let game = ctx.game;
    for pool in &game.pools {
        if let Some(range) = symbols.pool_range(&pool.name) {
            let name = upper_ident(&pool.name);
            ctx.out
                .line(format!("#define POOL_{name}_FIRST {}", range.start));
            ctx.out
                .line(format!("#define POOL_{name}_CAPACITY {}", range.len()));
        }
    }

    let xs = column(instances, |i| i.x.to_string());
    let ys = column(instances, |i| i.y.to_string());
    let ws = column(instances, |i| i.width.to_string());
    let hs = column(instances, |i| i.height.to_string());
    let tags = column(instances, |i| tag_const(&i.tag));
    let active = column(instances, |i| if i.pool.is_none() { "1" } else { "0" }.to_string());
    ctx.out
        .line(format!("int16_t ent_x[MAX_ENTITIES] = {{{xs}}};"));
    ctx.out
        .line(format!("int16_t ent_y[MAX_ENTITIES] = {{{ys}}};"));
    ctx.out.line("int16_t ent_vx[MAX_ENTITIES];");
    ctx.out.line("int16_t ent_vy[MAX_ENTITIES];");
    ctx.out
        .line(format!("const uint8_t ent_w[MAX_ENTITIES] = {{{ws}}};"));
    ctx.out
        .line(format!("const uint8_t ent_h[MAX_ENTITIES] = {{{hs}}};"));
    ctx.out
        .line(format!("const uint8_t ent_tag[MAX_ENTITIES] = {{{tags}}};"));
    ctx.out
        .line(format!("uint8_t ent_active[MAX_ENTITIES] = {{{active}}};"));
    ctx.out.blank();
    debug!(instances = instances.len(), pools = ctx.game.pools.len(), "entity table sized");
    Ok(())
}

/// Comma-separated initializer list of one table column.
pub(crate) fn column<F: Fn(&Instance) -> String>(instances: &[Instance], f: F) -> String {
    instances.iter().map(f).collect::<Vec<_>>().join(", ")
}

// ══════════════════════════════════════════════════════════════════════════════
// Functions
// ══════════════════════════════════════════════════════════════════════════════

pub fn emit_functions(ctx: &mut LowerContext<'_>) -> LowerResult<()> {
    let (game, symbols) = (ctx.game, ctx.symbols);
    let pools: Vec<_> = game
        .pools
        .iter()
        .filter(|p| symbols.pool_range(&p.name).is_some())
        .collect();
    if pools.is_empty() {
        return Ok(());
    }
    ctx.banner();
    for pool in pools {
        let name = c_ident(&pool.name);
        let upper = upper_ident(&pool.name);
        let first = format!("POOL_{upper}_FIRST");
        let end = format!("POOL_{upper}_FIRST + POOL_{upper}_CAPACITY");

        ctx.function(
            &format!("{name}_spawn"),
            &format!("uint8_t {name}_spawn(int16_t x, int16_t y)"),
            |ctx| {
                ctx.out.line("uint8_t i;");
                ctx.out.open(format!("for (i = {first}; i < {end}; i++)"));
                ctx.out.open("if (!ent_active[i])");
                ctx.out.line("ent_active[i] = 1;");
                ctx.out.line("ent_x[i] = x;");
                ctx.out.line("ent_y[i] = y;");
                ctx.out.line("ent_vx[i] = 0;");
                ctx.out.line("ent_vy[i] = 0;");
                ctx.out.line("return i;");
                ctx.out.close();
                ctx.out.close();
                ctx.out.line("return 0xFF;");
                Ok(())
            },
        )?;
        ctx.function(
            &format!("{name}_despawn"),
            &format!("void {name}_despawn(uint8_t i)"),
            |ctx| {
                ctx.out.open(format!("if (i >= {first} && i < {end})"));
                ctx.out.line("ent_active[i] = 0;");
                ctx.out.close();
                Ok(())
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LowerOptions;
    use crate::symbols::SymbolTable;
    use gbdsl_ir::game::EntityDef;
    use gbdsl_ir::Game;

    fn game() -> Game {
        Game::new("t")
            .with_entity(EntityDef::new("hero", "player", 8, 16).at(16, 32))
            .with_entity(EntityDef::new("bullet", "shot", 2, 2))
            .with_pool("bullets", "bullet", 2)
    }

    #[test]
    fn test_entity_table() {
        let game = game();
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        emit_data(&mut ctx).unwrap();
        let out = ctx.out.as_str();
        assert!(out.contains("enum { TAG_PLAYER, TAG_SHOT, TAG_COUNT };"));
        assert!(out.contains("#define MAX_ENTITIES 3"));
        assert!(out.contains("#define ENT_HERO 0"));
        assert!(!out.contains("ENT_BULLET"));
        assert!(out.contains("#define POOL_BULLETS_FIRST 1"));
        assert!(out.contains("#define POOL_BULLETS_CAPACITY 2"));
        assert!(out.contains("int16_t ent_x[MAX_ENTITIES] = {16, 0, 0};"));
        assert!(out.contains("const uint8_t ent_h[MAX_ENTITIES] = {16, 2, 2};"));
        assert!(out.contains("const uint8_t ent_tag[MAX_ENTITIES] = {TAG_PLAYER, TAG_SHOT, TAG_SHOT};"));
        assert!(out.contains("uint8_t ent_active[MAX_ENTITIES] = {1, 0, 0};"));
    }

    #[test]
    fn test_spawn_and_despawn() {
        let game = game();
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        emit_functions(&mut ctx).unwrap();
        let out = ctx.out.as_str();
        assert!(out.contains("uint8_t bullets_spawn(int16_t x, int16_t y) {"));
        assert!(out.contains(
            "for (i = POOL_BULLETS_FIRST; i < POOL_BULLETS_FIRST + POOL_BULLETS_CAPACITY; i++) {"
        ));
        assert!(out.contains("    return 0xFF;\n}"));
        assert!(out.contains("void bullets_despawn(uint8_t i) {"));
        assert_eq!(
            prototypes(&ctx),
            vec![
                "uint8_t bullets_spawn(int16_t x, int16_t y);".to_string(),
                "void bullets_despawn(uint8_t i);".to_string()
            ]
        );
    }

    #[test]
    fn test_no_entities_writes_nothing() {
        let game = Game::new("t");
        let symbols = SymbolTable::build(&game);
        let mut ctx = LowerContext::new(&game, &symbols, LowerOptions::default());
        emit_data(&mut ctx).unwrap();
        emit_functions(&mut ctx).unwrap();
        assert!(ctx.out.as_str().is_empty());
    }
}
