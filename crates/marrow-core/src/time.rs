//! Frame clock for the Marrow engine
//!
//! Turns raw wall-clock deltas into the scaled, clamped `dt` every system sees.

use serde::{Deserialize, Serialize};

/// Clock tuning, stored in the `[time]` settings section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Simulated seconds per real second
    pub time_scale: f32,
    /// Raw frame deltas above this are clamped
    pub max_delta_time: f32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            time_scale: 1.0,
            max_delta_time: 0.25,
        }
    }
}

/// Per-frame clock stored as a world resource.
#[derive(Debug, Clone, Default)]
pub struct GameTime {
    pub config: TimeConfig,
    /// Scaled seconds since start
    pub total_time: f64,
    /// `dt` handed to systems this frame
    pub delta_time: f32,
    /// Clamped but unscaled frame delta
    pub unscaled_delta_time: f32,
    pub frame_count: u64,
    pub paused: bool,
}

impl GameTime {
    pub fn new(config: TimeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Feed the raw wall-clock delta of the last frame. A paused clock still
    /// counts frames but reports a zero `delta_time`.
    pub fn update(&mut self, raw_delta: f32) {
        self.unscaled_delta_time = raw_delta.clamp(0.0, self.config.max_delta_time);
        self.frame_count += 1;

        if self.paused {
            self.delta_time = 0.0;
            return;
        }

        self.delta_time = self.unscaled_delta_time * self.config.time_scale;
        self.total_time += self.delta_time as f64;
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Negative scales are treated as frozen.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.config.time_scale = scale.max(0.0);
    }
}
