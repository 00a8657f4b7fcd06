//! Symbol table: names, numeric domains and instance slots resolved once
//! per generation run.

use std::collections::HashMap;
use std::ops::Range;

use gbdsl_ir::{Game, NumericDomain};

/// One slot of the entity instance table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub entity: String,
    pub tag: String,
    /// Owning pool; static instances have none.
    pub pool: Option<String>,
    pub x: i16,
    pub y: i16,
    pub width: u8,
    pub height: u8,
}

/// Resolved names of a [`Game`].
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Declared domains of scalars and arrays.
    pub domains: HashMap<String, NumericDomain>,
    array_lens: HashMap<String, u16>,
    scenes: Vec<String>,
    tags: Vec<String>,
    instances: Vec<Instance>,
    pools: HashMap<String, Range<usize>>,
}

impl SymbolTable {
    pub fn build(game: &Game) -> Self {
        let mut table = SymbolTable::default();
        for v in &game.variables {
            table.domains.insert(v.name.clone(), v.ty.domain());
        }
        for a in &game.arrays {
            table.domains.insert(a.name.clone(), a.ty.domain());
            table.array_lens.insert(a.name.clone(), a.len);
        }
        table.scenes = game.scenes.iter().map(|s| s.name.clone()).collect();
        table.tags = game.tags().into_iter().map(str::to_string).collect();

        for e in &game.entities {
            if game.is_pool_template(&e.name) {
                continue;
            }
            table.instances.push(Instance {
                entity: e.name.clone(),
                tag: e.tag.clone(),
                pool: None,
                x: e.x,
                y: e.y,
                width: e.width,
                height: e.height,
            });
        }
        for pool in &game.pools {
            // Pools of unknown entities get no slots; validation reports them.
            let Some(e) = game.entity(&pool.entity) else {
                continue;
            };
            let first = table.instances.len();
            for _ in 0..pool.capacity {
                table.instances.push(Instance {
                    entity: e.name.clone(),
                    tag: e.tag.clone(),
                    pool: Some(pool.name.clone()),
                    x: 0,
                    y: 0,
                    width: e.width,
                    height: e.height,
                });
            }
            table
                .pools
                .insert(pool.name.clone(), first..table.instances.len());
        }
        table
    }

    pub fn domain_of(&self, name: &str) -> Option<NumericDomain> {
        self.domains.get(name).copied()
    }

    pub fn array_len(&self, name: &str) -> Option<u16> {
        self.array_lens.get(name).copied()
    }

    // ── Scenes ───────────────────────────────────────────────────────────

    pub fn scenes(&self) -> &[String] {
        &self.scenes
    }

    pub fn scene_index(&self, name: &str) -> Option<usize> {
        self.scenes.iter().position(|s| s == name)
    }

    // ── Tags & instances ─────────────────────────────────────────────────

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn instances_of(&self, entity: &str) -> Vec<usize> {
        self.instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.entity == entity)
            .map(|(n, _)| n)
            .collect()
    }

    pub fn instances_with_tag(&self, tag: &str) -> Vec<usize> {
        self.instances
            .iter()
            .enumerate()
            .filter(|(_, i)| i.tag == tag)
            .map(|(n, _)| n)
            .collect()
    }

    pub fn pool_range(&self, pool: &str) -> Option<Range<usize>> {
        self.pools.get(pool).cloned()
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// C naming
// ══════════════════════════════════════════════════════════════════════════════

/// A valid C identifier derived from `name`.
pub fn c_ident(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// An upper-case C identifier, for enum members and macros.
pub fn upper_ident(name: &str) -> String {
    c_ident(name).to_ascii_uppercase()
}

pub fn scene_const(name: &str) -> String {
    format!("SCENE_{}", upper_ident(name))
}

pub fn tag_const(tag: &str) -> String {
    format!("TAG_{}", upper_ident(tag))
}

pub fn len_const(array: &str) -> String {
    format!("{}_LEN", upper_ident(array))
}

pub fn state_const(machine: &str, state: &str) -> String {
    format!("{}_STATE_{}", upper_ident(machine), upper_ident(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbdsl_ir::game::{EntityDef, SceneDef, VarType};

    #[test]
    fn test_instances_skip_pool_templates() {
        let game = Game::new("t")
            .with_entity(EntityDef::new("hero", "player", 8, 8).at(10, 20))
            .with_entity(EntityDef::new("bullet", "shot", 2, 2))
            .with_entity(EntityDef::new("rock", "wall", 16, 16))
            .with_pool("bullets", "bullet", 3);
        let t = SymbolTable::build(&game);
        assert_eq!(t.instance_count(), 5);
        assert_eq!(t.instances_of("hero"), vec![0]);
        assert_eq!(t.instances_of("rock"), vec![1]);
        assert_eq!(t.pool_range("bullets"), Some(2..5));
        assert_eq!(t.instances_with_tag("shot"), vec![2, 3, 4]);
        assert_eq!(t.instances()[0].x, 10);
    }

    #[test]
    fn test_domains_and_scenes() {
        let game = Game::new("t")
            .with_variable("speed", VarType::I8, 0)
            .with_array("map", VarType::U16, 10, vec![])
            .with_scene(SceneDef::new("title"))
            .with_scene(SceneDef::new("level-1"));
        let t = SymbolTable::build(&game);
        assert_eq!(t.domain_of("speed"), Some(NumericDomain::I8));
        assert_eq!(t.array_len("map"), Some(10));
        assert_eq!(t.array_len("speed"), None);
        assert_eq!(t.scene_index("level-1"), Some(1));
        assert_eq!(scene_const("level-1"), "SCENE_LEVEL_1");
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(c_ident("boss fight"), "boss_fight");
        assert_eq!(c_ident("2p"), "_2p");
        assert_eq!(upper_ident("ai"), "AI");
        assert_eq!(state_const("ai", "idle"), "AI_STATE_IDLE");
        assert_eq!(len_const("hp"), "HP_LEN");
        assert_eq!(tag_const("player"), "TAG_PLAYER");
    }
}
