//! Physics world configuration.

use serde::{Deserialize, Serialize};

use crate::stmt::Stmt;
use crate::Fixed;

/// Global physics parameters plus per-entity bodies and collision pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsWorld {
    /// Added to vertical velocity every frame.
    pub gravity: Fixed,
    /// Horizontal velocity multiplier applied every frame.
    pub friction: Fixed,
    /// Velocity multiplier applied on a bounce.
    pub bounce: Fixed,
    #[serde(default)]
    pub zones: Vec<GravityZone>,
    #[serde(default)]
    pub bodies: Vec<PhysicsBody>,
    #[serde(default)]
    pub collisions: Vec<CollisionPair>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self {
            gravity: Fixed::ZERO,
            friction: Fixed::ONE,
            bounce: Fixed::ZERO,
            zones: Vec::new(),
            bodies: Vec::new(),
            collisions: Vec::new(),
        }
    }
}

/// A rectangle with its own gravity. The first zone containing an entity's
/// position wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GravityZone {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
    pub gravity: Fixed,
}

impl GravityZone {
    pub fn contains(&self, x: i16, y: i16) -> bool {
        let (x, y) = (x as i32, y as i32);
        let (zx, zy) = (self.x as i32, self.y as i32);
        x >= zx && x < zx + self.width as i32 && y >= zy && y < zy + self.height as i32
    }
}

/// Physics properties of an entity definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsBody {
    pub entity: String,
    /// Must be at least 1; mass 0 is reserved for static obstacles.
    pub mass: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friction: Option<Fixed>,
    pub max_vx: Fixed,
    pub max_vy: Fixed,
}

impl PhysicsBody {
    pub fn new(entity: impl Into<String>, mass: u8) -> Self {
        Self {
            entity: entity.into(),
            mass,
            friction: None,
            max_vx: Fixed(i16::MAX),
            max_vy: Fixed(i16::MAX),
        }
    }

    pub fn with_friction(mut self, friction: Fixed) -> Self {
        self.friction = Some(friction);
        self
    }

    pub fn with_max_velocity(mut self, max_vx: Fixed, max_vy: Fixed) -> Self {
        self.max_vx = max_vx;
        self.max_vy = max_vy;
        self
    }
}

/// Collision response between entities tagged `tag_a` and `tag_b`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionPair {
    pub tag_a: String,
    pub tag_b: String,
    /// Separate and bounce overlapping entities.
    #[serde(default = "default_solid")]
    pub solid: bool,
    /// Statements run for every overlapping pair; `hit_a` and `hit_b` hold
    /// the instance indices.
    #[serde(default)]
    pub on_hit: Vec<Stmt>,
}

fn default_solid() -> bool {
    true
}

impl CollisionPair {
    pub fn solid(tag_a: impl Into<String>, tag_b: impl Into<String>) -> Self {
        Self {
            tag_a: tag_a.into(),
            tag_b: tag_b.into(),
            solid: true,
            on_hit: Vec::new(),
        }
    }

    pub fn trigger(tag_a: impl Into<String>, tag_b: impl Into<String>, on_hit: Vec<Stmt>) -> Self {
        Self {
            tag_a: tag_a.into(),
            tag_b: tag_b.into(),
            solid: false,
            on_hit,
        }
    }
}
