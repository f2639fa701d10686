//! Input handling.
//!
//! A windowed build would sample arrow keys here. The headless demo drives
//! the publisher with [`ScriptedInput`], which bounces the texture sprite
//! around the window so subscribers have something to follow.

use sprite_shared::math::IVec2;

use crate::app::AppState;

/// Per-frame movement request for the texture sprite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub dx: i32,
    pub dy: i32,
}

impl InputState {
    pub fn delta(self) -> IVec2 {
        IVec2::new(self.dx, self.dy)
    }
}

/// Deterministic input source: constant velocity, reflected at the window
/// edges.
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    velocity: IVec2,
}

impl Default for ScriptedInput {
    fn default() -> Self {
        Self::new(IVec2::new(3, 2))
    }
}

impl ScriptedInput {
    pub fn new(velocity: IVec2) -> Self {
        Self { velocity }
    }

    /// Produces this frame's input, flipping an axis when the texture sprite
    /// would leave the window along it.
    pub fn sample(&mut self, state: &AppState) -> InputState {
        let pos = state.texture.position;
        let next = pos.saturating_add(self.velocity);
        if next.x < 0 || next.x.saturating_add(state.texture.size.w) > state.window.w {
            self.velocity.x = self.velocity.x.saturating_neg();
        }
        if next.y < 0 || next.y.saturating_add(state.texture.size.h) > state.window.h {
            self.velocity.y = self.velocity.y.saturating_neg();
        }
        InputState {
            dx: self.velocity.x,
            dy: self.velocity.y,
        }
    }
}
