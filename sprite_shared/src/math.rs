//! Math types.
//!
//! Screen space is integer pixels with the origin at the top-left corner.
//! Coordinates may be negative; sprites can sit partly or fully off screen.

use serde::{Deserialize, Serialize};

/// 2D integer vector, used for positions and deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct IVec2 {
    pub x: i32,
    pub y: i32,
}

impl IVec2 {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise add that saturates at the `i32` bounds.
    pub fn saturating_add(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }

    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self::new(self.x.clamp(min.x, max.x), self.y.clamp(min.y, max.y))
    }
}

/// Width and height in pixels. Not validated; zero or negative extents are
/// stored as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Extent {
    pub w: i32,
    pub h: i32,
}

impl Extent {
    pub const fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }
}
