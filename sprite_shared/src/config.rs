//! Configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! no file) works. Command-line flags override individual fields in the app.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::wire::WireFormat;

/// Settings shared by both channel roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Publisher bind address / subscriber connect address, e.g.
    /// `127.0.0.1:5555` or `tcp://*:5555`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Topic prefix. Empty subscribes to everything.
    #[serde(default)]
    pub topic: String,
    /// Wire field layout; must match on both ends.
    #[serde(default)]
    pub wire: WireFormat,
    /// Entity file; `.json` or `.xml`.
    #[serde(default = "default_entities_path")]
    pub entities_path: String,
    /// Delay between frames of the control loop.
    #[serde(default = "default_frame_delay_ms")]
    pub frame_delay_ms: u64,
    /// Frames to run before exiting; `None` runs until interrupted.
    #[serde(default)]
    pub max_frames: Option<u64>,
}

fn default_endpoint() -> String {
    "127.0.0.1:5555".to_string()
}

fn default_entities_path() -> String {
    "sprites.json".to_string()
}

fn default_frame_delay_ms() -> u64 {
    16
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            topic: String::new(),
            wire: WireFormat::default(),
            entities_path: default_entities_path(),
            frame_delay_ms: default_frame_delay_ms(),
            max_frames: None,
        }
    }
}

impl SyncConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }
}
