//! Runtime engine options and the settings-file round trip.
//!
//! Options are plain data; the coordinator compares old and new values on
//! [`crate::world::World::set_options`] and forces a reload when they
//! differ. `Settings::load_or_create` mirrors the usual first-run flow:
//! write pretty-printed defaults when the file is missing, fall back to
//! defaults (with a warning) when it is malformed.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::block::LeafQuality;

pub const MIN_RENDER_DISTANCE: u8 = 2;
pub const MAX_RENDER_DISTANCE: u8 = 32;

/// Runtime-mutable engine options. Every field change triggers a full
/// reload of resident chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Chebyshev radius of resident chunks, in chunk units.
    pub render_distance: u8,

    /// Greedy meshing; only effective while smooth lighting is off.
    pub use_greedy_mesher: bool,

    /// Per-vertex ambient occlusion with averaged light.
    pub smooth_lighting: bool,

    /// Shader-side visibility of the sunlight channel.
    pub use_sunlight: bool,

    /// Leaf face emission mode.
    pub leaf_quality: LeafQuality,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            render_distance: 8,
            use_greedy_mesher: false,
            smooth_lighting: true,
            use_sunlight: true,
            leaf_quality: LeafQuality::Fancy,
        }
    }
}

impl EngineOptions {
    /// Clamp out-of-range values into their valid domains.
    pub fn clamped(mut self) -> Self {
        self.render_distance = self
            .render_distance
            .clamp(MIN_RENDER_DISTANCE, MAX_RENDER_DISTANCE);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    pub seed: u32,
    pub options: EngineOptions,
}

impl Settings {
    /// Load settings, writing defaults on first run. A malformed file logs
    /// a warning and yields defaults instead of failing startup.
    pub fn load_or_create(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Settings>(&content) {
                Ok(settings) => Settings {
                    options: settings.options.clamped(),
                    ..settings
                },
                Err(err) => {
                    warn!(path = %path.display(), %err, "malformed settings file, using defaults");
                    Settings::default()
                }
            },
            Err(_) => {
                let settings = Settings::default();
                match settings.save(path) {
                    Ok(()) => info!(path = %path.display(), "wrote default settings"),
                    Err(err) => warn!(%err, "could not write default settings"),
                }
                settings
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_in_range() {
        let options = EngineOptions::default();
        assert!(options.render_distance >= MIN_RENDER_DISTANCE);
        assert!(options.render_distance <= MAX_RENDER_DISTANCE);
        assert_eq!(options, options.clamped());
    }

    #[test]
    fn clamping_limits_render_distance() {
        let too_far = EngineOptions { render_distance: 200, ..Default::default() };
        assert_eq!(too_far.clamped().render_distance, MAX_RENDER_DISTANCE);
        let too_near = EngineOptions { render_distance: 0, ..Default::default() };
        assert_eq!(too_near.clamped().render_distance, MIN_RENDER_DISTANCE);
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config").join("settings.json");

        let settings = Settings {
            seed: 99,
            options: EngineOptions {
                render_distance: 6,
                use_greedy_mesher: true,
                smooth_lighting: false,
                use_sunlight: false,
                leaf_quality: LeafQuality::Fast,
            },
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load_or_create(&path), settings);
    }

    #[test]
    fn missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings::load_or_create(&path);
        assert_eq!(settings, Settings::default());
        assert!(path.exists());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_or_create(&path), Settings::default());
    }
}
