//! Signed 8.8 fixed-point numbers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A signed 16-bit value with 8 integer and 8 fractional bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fixed(pub i16);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(256);

    /// Build from an integer, saturating at the representable range.
    pub fn from_int(value: i32) -> Self {
        Fixed((value.clamp(-128, 127) * 256) as i16)
    }

    /// Build from a float, rounding to the nearest 1/256 and saturating.
    pub fn from_f32(value: f32) -> Self {
        let raw = (value * 256.0).round();
        Fixed(raw.clamp(i16::MIN as f32, i16::MAX as f32) as i16)
    }

    pub fn from_raw(raw: i16) -> Self {
        Fixed(raw)
    }

    pub fn raw(self) -> i16 {
        self.0
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / 256.0
    }

    /// `(a * b) >> 8` with a 32-bit intermediate, truncated back to 16 bits
    /// the way the target does it.
    pub fn mul(self, other: Fixed) -> Fixed {
        Fixed(((self.0 as i32 * other.0 as i32) >> 8) as i16)
    }

    /// Scale a raw 8.8 velocity or offset by this factor.
    pub fn scale(self, value: i16) -> i16 {
        ((value as i32 * self.0 as i32) >> 8) as i16
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_f32())
    }
}
