//! Navigation grids for the pathfinder.
//!
//! Walkability is one bit per tile, row-major, eight tiles per byte (tile 0
//! is bit 0 of byte 0). Weights, when present, are one byte per tile.
//!
//! The two layers are coupled in one direction only: writing a weight
//! updates walkability (zero blocks the tile, nonzero opens it), while
//! writing walkability never touches the weight.

use serde::{Deserialize, Serialize};

use crate::{IrError, Result};

/// Largest supported grid edge; the target's closed set is a 32×32 bitset.
pub const MAX_GRID_SIZE: u8 = 32;

/// A tile coordinate.
pub type Tile = (u8, u8);

/// A walkability bitset plus optional movement weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGrid {
    width: u8,
    height: u8,
    walkable: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weights: Option<Vec<u8>>,
}

impl NavGrid {
    /// A fully blocked grid.
    pub fn new(width: u8, height: u8) -> Result<Self> {
        if width == 0 || height == 0 || width > MAX_GRID_SIZE || height > MAX_GRID_SIZE {
            return Err(IrError::invalid(format!(
                "navigation grid {width}x{height} outside 1..={MAX_GRID_SIZE} per edge"
            )));
        }
        let tiles = width as usize * height as usize;
        Ok(Self {
            width,
            height,
            walkable: vec![0; tiles.div_ceil(8)],
            weights: None,
        })
    }

    /// A fully walkable grid.
    pub fn open(width: u8, height: u8) -> Result<Self> {
        let mut grid = Self::new(width, height)?;
        for i in 0..grid.tile_count() {
            grid.set_bit(i, true);
        }
        Ok(grid)
    }

    /// Parse rows of `.` (walkable), `#` (blocked) or `1`-`9` (walkable
    /// with that weight). Any digit enables the weight layer.
    pub fn from_rows(rows: &[&str]) -> Result<Self> {
        let height = u8::try_from(rows.len())
            .map_err(|_| IrError::invalid("navigation grid has too many rows"))?;
        let width = rows.first().map(|r| r.chars().count()).unwrap_or(0);
        let width =
            u8::try_from(width).map_err(|_| IrError::invalid("navigation grid row too wide"))?;
        let mut grid = Self::new(width, height)?;
        for (y, row) in rows.iter().enumerate() {
            if row.chars().count() != width as usize {
                return Err(IrError::invalid(format!(
                    "navigation grid row {y} has {} tiles, expected {width}",
                    row.chars().count()
                )));
            }
            for (x, ch) in row.chars().enumerate() {
                let tile = (x as u8, y as u8);
                match ch {
                    '.' => grid.set_walkable(tile, true),
                    '#' => grid.set_walkable(tile, false),
                    '1'..='9' => grid.set_weight(tile, ch as u8 - b'0'),
                    other => {
                        return Err(IrError::invalid(format!(
                            "unexpected navigation tile '{other}' at ({x}, {y})"
                        )))
                    }
                }
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> u8 {
        self.width
    }

    pub fn height(&self) -> u8 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn contains(&self, (x, y): Tile) -> bool {
        x < self.width && y < self.height
    }

    /// Row-major index of a tile.
    pub fn index(&self, (x, y): Tile) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn tile_at(&self, index: usize) -> Tile {
        (
            (index % self.width as usize) as u8,
            (index / self.width as usize) as u8,
        )
    }

    pub fn is_walkable(&self, tile: Tile) -> bool {
        self.contains(tile) && self.bit(self.index(tile))
    }

    /// Set walkability. Weights are left as they are.
    pub fn set_walkable(&mut self, tile: Tile, walkable: bool) {
        if self.contains(tile) {
            let i = self.index(tile);
            self.set_bit(i, walkable);
        }
    }

    /// Movement cost of entering a tile (1 without a weight layer).
    pub fn weight(&self, tile: Tile) -> u8 {
        match &self.weights {
            Some(w) if self.contains(tile) => w[self.index(tile)],
            _ => 1,
        }
    }

    pub fn has_weights(&self) -> bool {
        self.weights.is_some()
    }

    /// Set a tile's weight, enabling the weight layer (all ones) on first
    /// use. Zero blocks the tile; nonzero opens it.
    pub fn set_weight(&mut self, tile: Tile, weight: u8) {
        if !self.contains(tile) {
            return;
        }
        let count = self.tile_count();
        let i = self.index(tile);
        self.weights.get_or_insert_with(|| vec![1; count])[i] = weight;
        self.set_bit(i, weight != 0);
    }

    /// Packed walkability bytes, as emitted into the target.
    pub fn walkable_bytes(&self) -> &[u8] {
        &self.walkable
    }

    pub fn weight_bytes(&self) -> Option<&[u8]> {
        self.weights.as_deref()
    }

    /// Re-check the size invariants, e.g. after deserializing.
    pub fn validate(&self) -> Result<()> {
        let fresh = Self::new(self.width, self.height)?;
        if self.walkable.len() != fresh.walkable.len() {
            return Err(IrError::invalid(format!(
                "navigation bitset holds {} bytes, expected {}",
                self.walkable.len(),
                fresh.walkable.len()
            )));
        }
        match &self.weights {
            Some(w) if w.len() != self.tile_count() => Err(IrError::invalid(format!(
                "navigation weights hold {} entries, expected {}",
                w.len(),
                self.tile_count()
            ))),
            _ => Ok(()),
        }
    }

    pub fn walkable_count(&self) -> usize {
        (0..self.tile_count()).filter(|&i| self.bit(i)).count()
    }

    fn bit(&self, i: usize) -> bool {
        self.walkable[i / 8] & (1 << (i % 8)) != 0
    }

    fn set_bit(&mut self, i: usize, on: bool) {
        if on {
            self.walkable[i / 8] |= 1 << (i % 8);
        } else {
            self.walkable[i / 8] &= !(1 << (i % 8));
        }
    }
}

// ══════════════════════════════════════════════════════════════════════════════
// Pathfinder configuration
// ══════════════════════════════════════════════════════════════════════════════

/// Distance estimate used for `h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heuristic {
    #[default]
    Manhattan,
    Chebyshev,
}

impl Heuristic {
    pub fn estimate(self, (ax, ay): Tile, (bx, by): Tile) -> u16 {
        let dx = (ax as i16 - bx as i16).unsigned_abs();
        let dy = (ay as i16 - by as i16).unsigned_abs();
        match self {
            Heuristic::Manhattan => dx + dy,
            Heuristic::Chebyshev => dx.max(dy),
        }
    }
}

/// Search parameters compiled into a grid's query routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathfinderConfig {
    pub diagonal: bool,
    pub heuristic: Heuristic,
    /// Maximum node expansions before the search gives up.
    pub max_iterations: u16,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            diagonal: false,
            heuristic: Heuristic::Manhattan,
            max_iterations: 256,
        }
    }
}

/// A named grid with its query configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGridDef {
    pub name: String,
    pub grid: NavGrid,
    #[serde(default)]
    pub pathfinder: PathfinderConfig,
}
