//! Application state.
//!
//! Everything the control loop mutates lives in [`AppState`]; it is owned by
//! the loop and passed by reference to input, sync, and rendering.
//!
//! The entity file stores the scene as one list. By convention index 0 is the
//! texture (logo) sprite, index 1 is the message (text) sprite, and anything
//! after that is decoration that is drawn but never synced.

use sprite_shared::{
    entity::{Entity, EntityList},
    math::{Extent, IVec2},
    render::RenderBackend,
    wire::SyncSnapshot,
};

use crate::input::InputState;

/// Window size the demo lays sprites out in.
pub const WINDOW: Extent = Extent::new(800, 600);

/// Scene written when no usable entity file exists.
pub fn default_entities() -> EntityList {
    EntityList::from(vec![
        Entity::new(100, 100, 64, 64),
        Entity::new(0, 0, 320, 90),
        Entity::default(),
    ])
}

/// Scene state owned by the control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub texture: Entity,
    pub message: Entity,
    pub decorations: EntityList,
    pub window: Extent,
}

impl AppState {
    /// Splits a loaded list into the synced sprites and decoration. Missing
    /// synced sprites fall back to the default scene.
    pub fn from_entities(entities: EntityList) -> Self {
        let defaults = default_entities();
        let mut iter = entities.into_iter();
        let texture = iter
            .next()
            .or_else(|| defaults.get(0).copied())
            .unwrap_or_default();
        let message = iter
            .next()
            .or_else(|| defaults.get(1).copied())
            .unwrap_or_default();
        Self {
            texture,
            message,
            decorations: iter.collect(),
            window: WINDOW,
        }
    }

    /// Reassembles the persisted list in file order.
    pub fn to_entities(&self) -> EntityList {
        [self.texture, self.message]
            .into_iter()
            .chain(self.decorations.iter().copied())
            .collect()
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot::new(self.texture.position, self.message.position)
    }

    pub fn apply_snapshot(&mut self, snapshot: SyncSnapshot) {
        self.texture.position = snapshot.texture;
        self.message.position = snapshot.message;
    }

    /// Moves the texture sprite, keeping its top-left corner inside the
    /// window.
    pub fn apply_input(&mut self, input: InputState) {
        self.texture.translate(input.delta());
        let max = IVec2::new(self.window.w - 1, self.window.h - 1);
        self.texture.position = self.texture.position.clamp(IVec2::ZERO, max);
    }

    pub fn render(&self, renderer: &mut dyn RenderBackend, frame: u64) {
        renderer.begin_frame(frame);
        for (i, sprite) in self.decorations.iter().enumerate() {
            renderer.draw_entity(&format!("sprite{i}"), sprite);
        }
        renderer.draw_entity("texture", &self.texture);
        renderer.draw_entity("message", &self.message);
        renderer.end_frame();
    }
}
