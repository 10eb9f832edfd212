//! TimePond - a portal and timeline-branching physics puzzle core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (atoms, links, rotation, portals, worlds)
//! - `hand`: Pointer input session (which atom is being dragged)
//! - `render`: Draw hook dispatch onto an abstract drawing surface
//! - `settings`: Data-driven simulation tuning

pub mod error;
pub mod hand;
pub mod render;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, SimError, SimResult};
pub use settings::SimSettings;

use glam::Vec2;

/// Simulation configuration constants
pub mod consts {
    /// Default world dimensions (pixels)
    pub const WORLD_WIDTH: f32 = 420.0;
    pub const WORLD_HEIGHT: f32 = 380.0;

    /// Mover physics defaults (per tick, 60 Hz)
    pub const MOVER_GRAVITY: f32 = 0.5;
    pub const MOVER_AIR_RESISTANCE: f32 = 0.99;
    pub const MOVER_FRICTION: f32 = 0.8;

    /// Gap left between a blocked mover and the surface it landed on
    pub const CONTACT_GAP: f32 = 0.1;

    /// How far back a pastline portal reaches (ticks)
    pub const PASTLINE_LOOKBACK: usize = 30;
    /// Past snapshots kept per world (index `PASTLINE_LOOKBACK` must exist)
    pub const PAST_PROJECTION_DEPTH: usize = PASTLINE_LOOKBACK + 1;
    /// How far ahead a future projection is simulated (ticks)
    pub const FUTURE_LOOKAHEAD: u32 = 30;

    /// Upward kick given by a rotate potion
    pub const POTION_IMPULSE: f32 = 5.0;

    /// Grounded ticks a being waits before hopping
    pub const BEING_JUMP_INTERVAL: u32 = 60;
    /// Velocity below which a being counts as standing still
    pub const BEING_REST_SPEED: f32 = 0.1;
}

/// Number of quarter turns between two orientations, in [0, 4)
#[inline]
pub fn quarter_turns(from: u8, to: u8) -> u8 {
    (i32::from(to) - i32::from(from)).rem_euclid(4) as u8
}

/// Rotate a vector by a quarter turn clockwise in screen space (y grows downward)
#[inline]
pub fn rotate_cw(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
