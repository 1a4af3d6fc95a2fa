//! Frame scheduler
//!
//! The host calls `frame` from its frame callback. Each call measures the
//! delta since the previous frame and runs exactly one world tick scaled by it.

use crate::consts::{MAX_DT_SCALE, NOMINAL_FRAME_MS};
use crate::input::IntentQueue;
use crate::sim::{Ruleset, WorldState, tick};

/// Why a frame did not tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not registered, or already deregistered by teardown
    NotRegistered,
    /// The world is over; only a final paint remains
    Finished,
}

/// Result of one host frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    Ticked { dt_scale: f32 },
    Idle(SkipReason),
}

/// Convert a frame delta into a tick scale
///
/// One nominal 60 Hz frame is 1.0. Non-finite or negative deltas count as one
/// nominal frame; long hitches are capped.
pub fn dt_scale_for(delta_ms: f64) -> f32 {
    if !delta_ms.is_finite() || delta_ms < 0.0 {
        return 1.0;
    }
    ((delta_ms / NOMINAL_FRAME_MS as f64) as f32).clamp(0.0, MAX_DT_SCALE)
}

#[derive(Debug, Clone, Default)]
pub struct FrameScheduler {
    registered: bool,
    last_frame_ms: Option<f64>,
    ticks: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start accepting frames. The first frame after registering is nominal.
    pub fn register(&mut self) {
        self.registered = true;
        self.last_frame_ms = None;
    }

    pub fn deregister(&mut self) {
        self.registered = false;
        self.last_frame_ms = None;
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// Ticks run since construction
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Handle one host frame at timestamp `now_ms`
    pub fn frame(
        &mut self,
        now_ms: f64,
        world: &mut WorldState,
        rules: &Ruleset,
        intents: &mut IntentQueue,
    ) -> FrameOutcome {
        if !self.registered {
            return FrameOutcome::Idle(SkipReason::NotRegistered);
        }
        if world.game_over {
            intents.clear();
            return FrameOutcome::Idle(SkipReason::Finished);
        }

        let dt_scale = match self.last_frame_ms {
            Some(last) => dt_scale_for(now_ms - last),
            None => 1.0,
        };
        self.last_frame_ms = Some(now_ms);

        tick(world, rules, intents, dt_scale);
        self.ticks += 1;
        FrameOutcome::Ticked { dt_scale }
    }
}
