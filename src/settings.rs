//! Simulation settings
//!
//! Loaded from JSON by the runner; every field has a default so partial files work.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

/// Tunable simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimSettings {
    // === World ===
    /// Width of one world (also the grid cell width for addressing)
    pub world_width: f32,
    /// Height of one world
    pub world_height: f32,

    // === Movers ===
    /// Downward acceleration per tick
    pub gravity: f32,
    /// Velocity multiplier applied every tick
    pub air_resistance: f32,
    /// Horizontal velocity multiplier while grounded
    pub friction: f32,
    /// Upward kick from a rotate potion
    pub potion_impulse: f32,
    /// Grounded ticks before a being hops
    pub jump_interval: u32,

    // === Timelines ===
    /// Past snapshots kept per world (0 disables recording)
    pub past_projection_depth: usize,
    /// Snapshot index a pastline portal travels to
    pub pastline_lookback: usize,
    /// Ticks a future projection runs ahead (0 disables future projections)
    pub future_lookahead: u32,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            world_width: WORLD_WIDTH,
            world_height: WORLD_HEIGHT,

            gravity: MOVER_GRAVITY,
            air_resistance: MOVER_AIR_RESISTANCE,
            friction: MOVER_FRICTION,
            potion_impulse: POTION_IMPULSE,
            jump_interval: BEING_JUMP_INTERVAL,

            past_projection_depth: PAST_PROJECTION_DEPTH,
            pastline_lookback: PASTLINE_LOOKBACK,
            future_lookahead: FUTURE_LOOKAHEAD,
        }
    }
}

impl SimSettings {
    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Settings with no gravity or drag (handy for scripted scenes)
    pub fn frictionless() -> Self {
        Self {
            gravity: 0.0,
            air_resistance: 1.0,
            friction: 1.0,
            ..Self::default()
        }
    }

    /// Settings used while speculatively advancing a projection: no history, no
    /// nested projections
    pub fn for_projection(&self) -> Self {
        Self {
            past_projection_depth: 0,
            future_lookahead: 0,
            ..self.clone()
        }
    }

    /// Whether pastline portals can ever find their snapshot
    pub fn records_past(&self) -> bool {
        self.past_projection_depth > self.pastline_lookback
    }

    /// Keep the history ring deep enough for the configured lookback
    fn sanitized(mut self) -> Self {
        if self.past_projection_depth != 0 && self.past_projection_depth <= self.pastline_lookback {
            log::warn!(
                "past_projection_depth {} too shallow for lookback {}, raising it",
                self.past_projection_depth,
                self.pastline_lookback
            );
            self.past_projection_depth = self.pastline_lookback + 1;
        }
        self
    }
}
