//! Entity file bootstrap.
//!
//! A missing or unusable entity file is replaced with the default scene and
//! loaded again, once. Anything else is a startup failure.

use anyhow::Context;
use sprite_shared::{
    entity::EntityList,
    store::{EntityStore, StoreOutcome},
};
use tracing::{info, warn};

use crate::app::default_entities;

/// Loads the scene from `store`, writing defaults first if needed.
///
/// An unknown file format cannot be loaded or written; the default scene is
/// used in memory.
pub fn load_entities(store: &EntityStore) -> anyhow::Result<EntityList> {
    let mut entities = EntityList::new();
    match store.load(&mut entities) {
        Ok(StoreOutcome::Completed { .. }) => Ok(entities),
        Ok(StoreOutcome::Skipped) => {
            warn!(path = %store.path().display(), "Using default entities in memory");
            Ok(default_entities())
        }
        Err(e) if e.needs_bootstrap() => {
            warn!(error = %e, "Entity file unusable, writing defaults");
            store
                .save(&default_entities())
                .context("write default entity file")?;
            store
                .load(&mut entities)
                .context("reload default entity file")?;
            info!(path = %store.path().display(), entities = entities.len(), "Entity file bootstrapped");
            Ok(entities)
        }
        Err(e) => Err(e).context("load entity file"),
    }
}
