//! Score to discount tier mapping
//!
//! Pure lookups over a merchant-defined tier table. Used every tick for HUD
//! feedback and once at session end to compute the discount earned.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A reward threshold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountTier {
    /// Lowest score that earns this tier
    pub min_score: u64,
    /// Discount in percent (0-100)
    #[serde(rename = "discount")]
    pub discount_percent: u32,
    #[serde(default)]
    pub message: String,
}

impl DiscountTier {
    pub fn new(min_score: u64, discount_percent: u32, message: impl Into<String>) -> Self {
        Self {
            min_score,
            discount_percent,
            message: message.into(),
        }
    }

    /// Tier resolved when no threshold is met
    pub fn zero() -> Self {
        Self::new(0, 0, "")
    }
}

/// Ordered tier list; `min_score` strictly increases from one tier to the next
/// and `discount_percent` never decreases, so lookups are monotonic in score
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TierTable {
    tiers: Vec<DiscountTier>,
}

impl TierTable {
    /// Build a validated table
    pub fn new(tiers: Vec<DiscountTier>) -> Result<Self, ConfigError> {
        if tiers.is_empty() {
            return Err(ConfigError::EmptyTiers);
        }
        for (index, tier) in tiers.iter().enumerate() {
            if tier.discount_percent > 100 {
                return Err(ConfigError::DiscountOutOfRange {
                    index,
                    discount: tier.discount_percent,
                });
            }
            if index > 0 {
                let prev = &tiers[index - 1];
                if tier.min_score <= prev.min_score {
                    return Err(ConfigError::NonIncreasingTiers { index });
                }
                if tier.discount_percent < prev.discount_percent {
                    return Err(ConfigError::DecreasingDiscount { index });
                }
            }
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[DiscountTier] {
        &self.tiers
    }

    /// Index of the tier with the greatest `min_score <= score`
    fn position(&self, score: u64) -> Option<usize> {
        // Sorted by min_score, so everything before the partition qualifies
        let qualifying = self.tiers.partition_point(|t| t.min_score <= score);
        qualifying.checked_sub(1)
    }

    /// Tier earned at `score`, or the zero tier if none qualifies
    pub fn lookup(&self, score: u64) -> DiscountTier {
        self.position(score)
            .map(|i| self.tiers[i].clone())
            .unwrap_or_else(DiscountTier::zero)
    }

    /// Discount percent earned at `score`
    pub fn discount_for(&self, score: u64) -> u32 {
        self.position(score)
            .map(|i| self.tiers[i].discount_percent)
            .unwrap_or(0)
    }

    /// The next tier above the one earned at `score`
    pub fn next_tier(&self, score: u64) -> Option<&DiscountTier> {
        let next = self.position(score).map(|i| i + 1).unwrap_or(0);
        self.tiers.get(next)
    }

    /// Points still needed to reach the next tier
    pub fn points_to_next(&self, score: u64) -> Option<u64> {
        self.next_tier(score).map(|t| t.min_score - score)
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: vec![
                DiscountTier::new(0, 0, "Keep playing to unlock a discount!"),
                DiscountTier::new(100, 5, "Nice! You unlocked 5% off"),
                DiscountTier::new(250, 10, "Great run! 10% off"),
                DiscountTier::new(500, 15, "Amazing! 15% off"),
                DiscountTier::new(1000, 20, "Legendary! 20% off"),
            ],
        }
    }
}

impl<'de> Deserialize<'de> for TierTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tiers = Vec::<DiscountTier>::deserialize(deserializer)?;
        TierTable::new(tiers).map_err(serde::de::Error::custom)
    }
}
