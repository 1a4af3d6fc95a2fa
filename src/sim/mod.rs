//! Simulation module
//!
//! All gameplay logic lives here. This module must stay deterministic for a
//! given seed and tick sequence:
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod particles;
pub mod physics;
pub mod ruleset;
pub mod spawn;
pub mod state;
pub mod tick;

pub use collision::{overlaps, resolve_collisions};
pub use ruleset::{
    Band, CollisionPredicate, MovementModel, PRESETS, PrimaryAction, Ruleset, SpawnKind,
    SpawnLane, SpawnWeight, Travel,
};
pub use spawn::{run_spawner, spawn_interval_ms};
pub use state::{
    Body, CollectEffect, Collectible, ColorTag, EndReason, EntityKind, GameEvent, Motion,
    Obstacle, ObstacleKind, Particle, Player, Shape, WallSide, WorldState,
};
pub use tick::{despawn_offscreen, tick};
