//! The root game configuration consumed by the lowering engine.
//!
//! Everything here is assembled once by the front end (directly, or from a
//! JSON document) and only read afterwards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expr::{Expr, NumericDomain};
use crate::nav::NavGridDef;
use crate::physics::PhysicsWorld;
use crate::save::SaveSchema;
use crate::stmt::Stmt;
use crate::{IrError, Result};

/// Hardware sprite budget shared by static entities and pool slots.
pub const MAX_ENTITIES: usize = 40;

// ══════════════════════════════════════════════════════════════════════════════
// Root
// ══════════════════════════════════════════════════════════════════════════════

/// A complete game description.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Game {
    pub name: String,
    #[serde(default)]
    pub variables: Vec<VarDecl>,
    #[serde(default)]
    pub arrays: Vec<ArrayDecl>,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
    #[serde(default)]
    pub pools: Vec<PoolDef>,
    #[serde(default)]
    pub scenes: Vec<SceneDef>,
    /// Defaults to the first scene.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_scene: Option<String>,
    #[serde(default)]
    pub state_machines: Vec<StateMachineDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<PhysicsWorld>,
    #[serde(default)]
    pub nav_grids: Vec<NavGridDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save: Option<SaveSchema>,
    #[serde(default)]
    pub cutscenes: Vec<Cutscene>,
    /// Opaque configuration for externally registered sections.
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Game {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration. A save schema is re-checked, since its
    /// offsets arrive precomputed.
    pub fn from_json(json: &str) -> Result<Self> {
        let game: Game =
            serde_json::from_str(json).map_err(|e| IrError::invalid(format!("game JSON: {e}")))?;
        if let Some(save) = &game.save {
            save.validate()?;
        }
        Ok(game)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| IrError::invalid(format!("game JSON: {e}")))
    }

    // ── Builders ─────────────────────────────────────────────────────────

    pub fn with_variable(mut self, name: impl Into<String>, ty: VarType, init: i32) -> Self {
        self.variables.push(VarDecl {
            name: name.into(),
            ty,
            init,
        });
        self
    }

    pub fn with_array(mut self, name: impl Into<String>, ty: VarType, len: u16, init: Vec<i32>) -> Self {
        self.arrays.push(ArrayDecl {
            name: name.into(),
            ty,
            len,
            init,
        });
        self
    }

    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    pub fn with_pool(mut self, name: impl Into<String>, entity: impl Into<String>, capacity: u8) -> Self {
        self.pools.push(PoolDef {
            name: name.into(),
            entity: entity.into(),
            capacity,
        });
        self
    }

    pub fn with_scene(mut self, scene: SceneDef) -> Self {
        self.scenes.push(scene);
        self
    }

    pub fn with_initial_scene(mut self, scene: impl Into<String>) -> Self {
        self.initial_scene = Some(scene.into());
        self
    }

    pub fn with_state_machine(mut self, machine: StateMachineDef) -> Self {
        self.state_machines.push(machine);
        self
    }

    pub fn with_physics(mut self, physics: PhysicsWorld) -> Self {
        self.physics = Some(physics);
        self
    }

    pub fn with_nav_grid(mut self, grid: NavGridDef) -> Self {
        self.nav_grids.push(grid);
        self
    }

    pub fn with_save(mut self, save: SaveSchema) -> Self {
        self.save = Some(save);
        self
    }

    pub fn with_cutscene(mut self, cutscene: Cutscene) -> Self {
        self.cutscenes.push(cutscene);
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    // ── Lookups ──────────────────────────────────────────────────────────

    pub fn variable(&self, name: &str) -> Option<&VarDecl> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn array(&self, name: &str) -> Option<&ArrayDecl> {
        self.arrays.iter().find(|a| a.name == name)
    }

    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn scene(&self, name: &str) -> Option<&SceneDef> {
        self.scenes.iter().find(|s| s.name == name)
    }

    /// The declared numeric domain of a scalar or array, if any.
    pub fn domain_of(&self, name: &str) -> Option<NumericDomain> {
        self.variable(name)
            .map(|v| v.ty.domain())
            .or_else(|| self.array(name).map(|a| a.ty.domain()))
    }

    /// The scene the entry point starts in.
    pub fn start_scene(&self) -> Option<&str> {
        self.initial_scene
            .as_deref()
            .or_else(|| self.scenes.first().map(|s| s.name.as_str()))
    }

    /// True if some pool spawns instances of `entity`.
    pub fn is_pool_template(&self, entity: &str) -> bool {
        self.pools.iter().any(|p| p.entity == entity)
    }

    /// Distinct entity tags in first-use order.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for e in &self.entities {
            if !tags.contains(&e.tag.as_str()) {
                tags.push(&e.tag);
            }
        }
        tags
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Variables
// ══════════════════════════════════════════════════════════════════════════════

/// Declared type of a game variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    #[default]
    U8,
    I8,
    U16,
    I16,
    Bool,
    /// 8.8 fixed point, stored as `int16_t`.
    Fixed,
}

impl VarType {
    pub fn domain(self) -> NumericDomain {
        match self {
            VarType::U8 | VarType::Bool => NumericDomain::U8,
            VarType::I8 => NumericDomain::I8,
            VarType::U16 => NumericDomain::U16,
            VarType::I16 | VarType::Fixed => NumericDomain::I16,
        }
    }

    pub fn c_type(self) -> &'static str {
        self.domain().c_type()
    }
}

/// A scalar global.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: String,
    #[serde(default)]
    pub ty: VarType,
    #[serde(default)]
    pub init: i32,
}

/// A fixed-length global array. Missing initializers are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayDecl {
    pub name: String,
    #[serde(default)]
    pub ty: VarType,
    pub len: u16,
    #[serde(default)]
    pub init: Vec<i32>,
}

impl ArrayDecl {
    pub fn validate(&self) -> Result<()> {
        if self.len == 0 {
            return Err(IrError::invalid(format!("array '{}' has length 0", self.name)));
        }
        if self.init.len() > self.len as usize {
            return Err(IrError::invalid(format!(
                "array '{}' has {} initializers for {} elements",
                self.name,
                self.init.len(),
                self.len
            )));
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Entities & pools
// ══════════════════════════════════════════════════════════════════════════════

/// An entity template. Entities that no pool refers to get one static
/// instance, placed at `(x, y)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    pub tag: String,
    pub width: u8,
    pub height: u8,
    #[serde(default)]
    pub x: i16,
    #[serde(default)]
    pub y: i16,
}

impl EntityDef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, width: u8, height: u8) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            width,
            height,
            x: 0,
            y: 0,
        }
    }

    pub fn at(mut self, x: i16, y: i16) -> Self {
        self.x = x;
        self.y = y;
        self
    }
}

/// A fixed number of reusable instance slots of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDef {
    pub name: String,
    pub entity: String,
    pub capacity: u8,
}

// ══════════════════════════════════════════════════════════════════════════════
// Scenes
// ══════════════════════════════════════════════════════════════════════════════

/// A scene with its lifecycle handlers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SceneDef {
    pub name: String,
    #[serde(default)]
    pub on_enter: Vec<Stmt>,
    #[serde(default)]
    pub on_frame: Vec<Stmt>,
    #[serde(default)]
    pub on_exit: Vec<Stmt>,
}

impl SceneDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn on_enter(mut self, stmts: Vec<Stmt>) -> Self {
        self.on_enter = stmts;
        self
    }

    pub fn on_frame(mut self, stmts: Vec<Stmt>) -> Self {
        self.on_frame = stmts;
        self
    }

    pub fn on_exit(mut self, stmts: Vec<Stmt>) -> Self {
        self.on_exit = stmts;
        self
    }

    /// Every statement of every handler.
    pub fn handlers(&self) -> impl Iterator<Item = &Stmt> {
        self.on_enter
            .iter()
            .chain(&self.on_frame)
            .chain(&self.on_exit)
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// State machines
// ══════════════════════════════════════════════════════════════════════════════

/// A finite state machine stepped once per frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineDef {
    pub name: String,
    pub initial: String,
    pub states: Vec<StateDef>,
    #[serde(default)]
    pub transitions: Vec<TransitionDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateDef {
    pub name: String,
    #[serde(default)]
    pub on_enter: Vec<Stmt>,
    #[serde(default)]
    pub on_update: Vec<Stmt>,
    #[serde(default)]
    pub on_exit: Vec<Stmt>,
}

impl StateDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Checked in declaration order; the first transition whose condition
/// holds fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionDef {
    pub from: String,
    pub to: String,
    pub when: Expr,
}

impl StateMachineDef {
    pub fn new(name: impl Into<String>, initial: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: initial.into(),
            states: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn state(mut self, state: StateDef) -> Self {
        self.states.push(state);
        self
    }

    pub fn transition(mut self, from: impl Into<String>, to: impl Into<String>, when: Expr) -> Self {
        self.transitions.push(TransitionDef {
            from: from.into(),
            to: to.into(),
            when,
        });
        self
    }

    /// Position of a state in the generated enum.
    pub fn state_index(&self, name: &str) -> Result<usize> {
        self.states
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| IrError::unknown("state", name))
    }

    /// Every state name referenced by `initial` and the transitions exists.
    pub fn validate(&self) -> Result<()> {
        self.state_index(&self.initial)?;
        for t in &self.transitions {
            self.state_index(&t.from)?;
            self.state_index(&t.to)?;
        }
        Ok(())
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Cutscenes
// ══════════════════════════════════════════════════════════════════════════════

/// A scripted sequence advanced one frame at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cutscene {
    pub name: String,
    pub steps: Vec<TimelineStep>,
}

impl Cutscene {
    pub fn new(name: impl Into<String>, steps: Vec<TimelineStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Total frames from start to finish.
    pub fn duration(&self) -> u32 {
        sequence_duration(&self.steps)
    }
}

/// Screen effect played by a [`TimelineStep::Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionEffect {
    FadeOut,
    FadeIn,
    Flash,
}

/// One step of a cutscene timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineStep {
    /// Do nothing for a number of frames.
    Wait { frames: u16 },
    /// Run statements once, taking no time.
    Run(Vec<Stmt>),
    /// Branches start together; the group lasts as long as its longest
    /// branch.
    Parallel(Vec<Vec<TimelineStep>>),
    /// Play a screen effect over a number of frames.
    Transition { effect: TransitionEffect, frames: u8 },
}

impl TimelineStep {
    pub fn duration(&self) -> u32 {
        match self {
            TimelineStep::Wait { frames } => *frames as u32,
            TimelineStep::Run(_) => 0,
            TimelineStep::Parallel(branches) => branches
                .iter()
                .map(|b| sequence_duration(b))
                .max()
                .unwrap_or(0),
            TimelineStep::Transition { frames, .. } => *frames as u32,
        }
    }
}

fn sequence_duration(steps: &[TimelineStep]) -> u32 {
    steps.iter().map(TimelineStep::duration).sum()
}
