//! Sprite entity model.
//!
//! An entity is a positioned rectangle. Entities have no id: identity is the
//! index in the owning [`EntityList`], and insertion order is draw order.

use serde::{Deserialize, Serialize};

use crate::math::{Extent, IVec2};

/// A positioned, sized rectangle.
///
/// Persisted as a flat `x, y, w, h` record so that the JSON and XML encodings
/// use the same four field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "EntityRecord", into = "EntityRecord")]
pub struct Entity {
    pub position: IVec2,
    pub size: Extent,
}

impl Default for Entity {
    fn default() -> Self {
        Self::new(0, 0, 10, 10)
    }
}

impl Entity {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            position: IVec2::new(x, y),
            size: Extent::new(w, h),
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.position.x.saturating_add(self.size.w)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.position.y.saturating_add(self.size.h)
    }

    pub fn contains(&self, point: IVec2) -> bool {
        point.x >= self.position.x
            && point.x < self.right()
            && point.y >= self.position.y
            && point.y < self.bottom()
    }

    /// Moves the entity by `delta`, saturating at the `i32` bounds.
    pub fn translate(&mut self, delta: IVec2) {
        self.position = self.position.saturating_add(delta);
    }
}

/// Flat on-disk shape of an [`Entity`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct EntityRecord {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl From<EntityRecord> for Entity {
    fn from(r: EntityRecord) -> Self {
        Entity::new(r.x, r.y, r.w, r.h)
    }
}

impl From<Entity> for EntityRecord {
    fn from(e: Entity) -> Self {
        EntityRecord {
            x: e.position.x,
            y: e.position.y,
            w: e.size.w,
            h: e.size.h,
        }
    }
}

/// Ordered, exclusively owned sequence of entities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityList {
    entities: Vec<Entity>,
}

impl EntityList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        self.entities.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Entity> {
        self.entities.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn clear(&mut self) {
        self.entities.clear();
    }

    /// Replaces the whole contents, keeping the order of `entities`.
    pub fn replace(&mut self, entities: Vec<Entity>) {
        self.entities = entities;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.entities.iter()
    }

    pub fn as_slice(&self) -> &[Entity] {
        &self.entities
    }
}

impl From<Vec<Entity>> for EntityList {
    fn from(entities: Vec<Entity>) -> Self {
        Self { entities }
    }
}

impl FromIterator<Entity> for EntityList {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self {
            entities: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EntityList {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}

impl IntoIterator for EntityList {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}
