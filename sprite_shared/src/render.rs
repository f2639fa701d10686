//! Rendering abstraction.
//!
//! No graphics backend here. A windowed renderer implements
//! [`RenderBackend`]; headless runs use [`NullRenderer`] or [`LogRenderer`].

use tracing::debug;

use crate::entity::Entity;

/// Per-frame drawing API the control loop talks to.
pub trait RenderBackend: Send {
    fn begin_frame(&mut self, frame: u64);
    fn draw_entity(&mut self, label: &str, entity: &Entity);
    fn end_frame(&mut self);
}

/// Draws nothing.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self, _frame: u64) {}
    fn draw_entity(&mut self, _label: &str, _entity: &Entity) {}
    fn end_frame(&mut self) {}
}

/// Logs draw calls at debug level, every `every` frames.
pub struct LogRenderer {
    every: u64,
    active: bool,
    frame: u64,
}

impl LogRenderer {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            active: false,
            frame: 0,
        }
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new(60)
    }
}

impl RenderBackend for LogRenderer {
    fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.active = frame % self.every == 0;
    }

    fn draw_entity(&mut self, label: &str, entity: &Entity) {
        if self.active {
            debug!(
                frame = self.frame,
                label,
                x = entity.position.x,
                y = entity.position.y,
                w = entity.size.w,
                h = entity.size.h,
                "Draw"
            );
        }
    }

    fn end_frame(&mut self) {
        self.active = false;
    }
}
