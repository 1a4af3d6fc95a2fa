//! Discount Arcade - score-to-discount mini-game widget engine
//!
//! Core modules:
//! - `sim`: Per-frame simulation (physics, spawning, collisions, particles)
//! - `tiers`: Score to discount tier mapping
//! - `session`: Session lifecycle (config load, start, finish) against the backend
//! - `scheduler`: One world tick per host frame
//! - `renderer`: Read-only snapshot painting
//! - `platform`: Browser host glue

pub mod backend;
pub mod config;
pub mod error;
pub mod input;
pub mod persistence;
pub mod platform;
pub mod plays;
pub mod renderer;
pub mod scheduler;
pub mod session;
pub mod sim;
pub mod tiers;

pub use config::{Difficulty, GameConfig, RemoteConfig};
pub use error::{BackendError, ConfigError, SessionError};
pub use session::{SessionController, SessionPhase, SessionResult};
pub use tiers::{DiscountTier, TierTable};

use glam::Vec2;

/// Engine tuning constants
pub mod consts {
    /// Nominal frame length all per-tick constants are tuned against (60 Hz)
    pub const NOMINAL_FRAME_MS: f32 = 1000.0 / 60.0;
    /// Largest delta multiplier applied to a single tick (a 20 fps hitch)
    pub const MAX_DT_SCALE: f32 = 3.0;

    /// Default logical playfield size (canvas is scaled to fit)
    pub const FIELD_WIDTH: f32 = 800.0;
    pub const FIELD_HEIGHT: f32 = 400.0;

    /// Entities this far outside the playfield are dropped
    pub const DESPAWN_MARGIN: f32 = 80.0;

    /// Particle cap per world
    pub const MAX_PARTICLES: usize = 256;

    /// How close to an orbit center a radial entity gets before it is dropped
    pub const ORBIT_CORE_RADIUS: f32 = 6.0;
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Convert cartesian (x, y) to polar (r, theta)
#[inline]
pub fn cartesian_to_polar(pos: Vec2) -> (f32, f32) {
    (pos.length(), pos.y.atan2(pos.x))
}
