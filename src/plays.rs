//! Play history and play limits
//!
//! Per-shop history lives in an injectable `PlayStore` owned by the session
//! controller. Loading prunes plays older than the rolling day window.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

/// Length of the rolling play-limit window
pub const DAY_MS: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

/// A configured limit that blocked a new session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayLimit {
    PerCustomer(u32),
    PerDay(u32),
}

impl fmt::Display for PlayLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayLimit::PerCustomer(max) => write!(f, "{} plays per customer", max),
            PlayLimit::PerDay(max) => write!(f, "{} plays per day", max),
        }
    }
}

/// Plays recorded for one shop on this device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayHistory {
    pub shop_id: String,
    pub total_plays: u32,
    /// Start timestamps (ms) inside the rolling window
    pub recent_plays: Vec<f64>,
    pub best_score: u64,
}

impl PlayHistory {
    pub fn new(shop_id: &str) -> Self {
        Self {
            shop_id: shop_id.to_string(),
            ..Default::default()
        }
    }

    /// Drop plays that fell out of the rolling window
    pub fn prune(&mut self, now_ms: f64) {
        self.recent_plays
            .retain(|&t| t.is_finite() && now_ms - t < DAY_MS && t <= now_ms);
    }

    pub fn plays_today(&self) -> u32 {
        self.recent_plays.len() as u32
    }

    pub fn record_play(&mut self, now_ms: f64) {
        self.total_plays = self.total_plays.saturating_add(1);
        self.recent_plays.push(now_ms);
    }

    /// Keep the best final score. Returns true on a new best.
    pub fn record_score(&mut self, score: u64) -> bool {
        if score > self.best_score {
            self.best_score = score;
            return true;
        }
        false
    }
}

/// Storage for play histories, keyed by shop
pub trait PlayStore {
    fn load(&self, shop_id: &str) -> Option<PlayHistory>;
    fn save(&mut self, history: &PlayHistory);
    /// Forget a shop's history
    fn invalidate(&mut self, shop_id: &str);
}

/// In-memory store for native runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    histories: HashMap<String, PlayHistory>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlayStore for MemoryStore {
    fn load(&self, shop_id: &str) -> Option<PlayHistory> {
        self.histories.get(shop_id).cloned()
    }

    fn save(&mut self, history: &PlayHistory) {
        self.histories
            .insert(history.shop_id.clone(), history.clone());
    }

    fn invalidate(&mut self, shop_id: &str) {
        self.histories.remove(shop_id);
    }
}

/// Load a shop's history with stale plays pruned
pub fn load_history(store: &dyn PlayStore, shop_id: &str, now_ms: f64) -> PlayHistory {
    let mut history = store
        .load(shop_id)
        .unwrap_or_else(|| PlayHistory::new(shop_id));
    history.prune(now_ms);
    history
}

/// Play-limit policy from the merchant config (0 = unlimited)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayLimiter {
    pub max_per_customer: u32,
    pub max_per_day: u32,
}

impl PlayLimiter {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            max_per_customer: config.max_plays_per_customer,
            max_per_day: config.max_plays_per_day,
        }
    }

    /// Check whether one more play is allowed
    pub fn check(&self, history: &PlayHistory) -> Result<(), PlayLimit> {
        if self.max_per_customer > 0 && history.total_plays >= self.max_per_customer {
            return Err(PlayLimit::PerCustomer(self.max_per_customer));
        }
        if self.max_per_day > 0 && history.plays_today() >= self.max_per_day {
            return Err(PlayLimit::PerDay(self.max_per_day));
        }
        Ok(())
    }
}
