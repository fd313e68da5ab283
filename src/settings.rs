//! Engine settings with persistence
//!
//! Settings are saved to `~/.config/marrow/settings.toml`

use std::fs;
use std::path::{Path, PathBuf};

use marrow_core::TimeConfig;
use marrow_ecs::DEFAULT_CHUNK_SIZE;
use marrow_physics::PhysicsConfig;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// All engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
    pub time: TimeConfig,
    pub ecs: EcsSettings,
    pub physics: PhysicsConfig,
    pub simulation: SimulationSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            time: TimeConfig::default(),
            ecs: EcsSettings::default(),
            physics: PhysicsConfig::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

impl EngineSettings {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("marrow"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Load settings from the config directory, or return defaults if not found
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("Could not determine config directory");
                Self::default()
            }
        }
    }

    /// Load settings from `path`, falling back to defaults on any failure
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No settings file found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    Self::sanitized(settings)
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Replace values the engine cannot run with by their defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.ecs.storage_chunk_size == 0 {
            warn!("storage_chunk_size must be non-zero, using {}", DEFAULT_CHUNK_SIZE);
            self.ecs.storage_chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if !(self.physics.timestep > 0.0 && self.physics.timestep.is_finite()) {
            warn!(
                "Physics timestep {} is not positive, using {}",
                self.physics.timestep, defaults.physics.timestep
            );
            self.physics.timestep = defaults.physics.timestep;
        }
        if !(self.time.max_delta_time >= 0.0) {
            warn!(
                "max_delta_time {} is negative, using {}",
                self.time.max_delta_time, defaults.time.max_delta_time
            );
            self.time.max_delta_time = defaults.time.max_delta_time;
        }
        if !(self.time.time_scale >= 0.0) {
            warn!("time_scale {} is negative, freezing time", self.time.time_scale);
            self.time.time_scale = 0.0;
        }
        self
    }

    /// Save settings to the config directory
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = Self::settings_path() else {
            anyhow::bail!("Could not determine config directory");
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Component storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsSettings {
    /// Components per storage chunk
    pub storage_chunk_size: usize,
}

impl Default for EcsSettings {
    fn default() -> Self {
        Self {
            storage_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Headless simulation run settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Frames to simulate before exiting
    pub frames: u32,
    /// Wall-clock seconds fed to the clock each frame
    pub frame_delta: f32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            frames: 120,
            frame_delta: 1.0 / 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: EngineSettings = toml::from_str(
            r#"
            log_filter = "debug"

            [ecs]
            storage_chunk_size = 16

            [time]
            time_scale = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(settings.log_filter, "debug");
        assert_eq!(settings.ecs.storage_chunk_size, 16);
        assert_eq!(settings.time.time_scale, 0.5);
        assert_eq!(settings.time.max_delta_time, TimeConfig::default().max_delta_time);
        assert_eq!(settings.simulation.frames, 120);
    }

    #[test]
    fn zero_chunk_size_is_replaced() {
        let path = std::env::temp_dir().join(format!("marrow-zero-chunk-{}.toml", std::process::id()));
        fs::write(&path, "[ecs]\nstorage_chunk_size = 0\n\n[physics]\ntimestep = 0.0\n").unwrap();
        let settings = EngineSettings::load_from(&path);
        let _ = fs::remove_file(&path);
        assert_eq!(settings.ecs.storage_chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(settings.physics.timestep, PhysicsConfig::default().timestep);
    }

    #[test]
    fn negative_clock_values_are_replaced() {
        let settings: EngineSettings = toml::from_str(
            r#"
            [time]
            time_scale = -2.0
            max_delta_time = -1.0
            "#,
        )
        .unwrap();
        let settings = settings.sanitized();
        assert_eq!(settings.time.time_scale, 0.0);
        assert_eq!(settings.time.max_delta_time, TimeConfig::default().max_delta_time);
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("marrow-settings-{}", std::process::id()))
            .join("settings.toml");
        let mut settings = EngineSettings::default();
        settings.simulation.frames = 7;
        settings.physics.gravity.y = -1.62;
        settings.save_to(&path).unwrap();

        let loaded = EngineSettings::load_from(&path);
        assert_eq!(loaded.simulation.frames, 7);
        assert_eq!(loaded.physics.gravity.y, -1.62);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn unreadable_file_falls_back() {
        let path = std::env::temp_dir().join(format!("marrow-bad-{}.toml", std::process::id()));
        fs::write(&path, "frames = [").unwrap();
        assert_eq!(EngineSettings::load_from(&path).log_filter, "info");
        let _ = fs::remove_file(&path);
        assert_eq!(EngineSettings::load_from(&path).simulation.frames, 120);
    }
}
