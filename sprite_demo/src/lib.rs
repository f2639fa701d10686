//! `sprite_demo`
//!
//! Headless sprite demo:
//! - Entity file load with default-scene bootstrap
//! - Scripted input for the publisher
//! - Per-frame position sync (publisher or subscriber)
//! - Rendering through the `RenderBackend` abstraction

pub mod app;
pub mod bootstrap;
pub mod demo;
pub mod input;

pub use app::AppState;
pub use demo::SpriteDemo;
