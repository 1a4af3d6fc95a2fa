//! Merchant game configuration
//!
//! Fetched per shop from the configuration collaborator. Every remote field is
//! optional; missing or invalid fields keep the built-in default.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::sim::Ruleset;
use crate::tiers::{DiscountTier, TierTable};

/// Difficulty levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Multiplier on spawn intervals (larger = sparser)
    pub fn interval_factor(&self) -> f32 {
        match self {
            Difficulty::Easy => 1.25,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 0.8,
        }
    }

    /// Multiplier on entity travel speed
    pub fn speed_factor(&self) -> f32 {
        match self {
            Difficulty::Easy => 0.85,
            Difficulty::Medium => 1.0,
            Difficulty::Hard => 1.2,
        }
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" | "med" | "normal" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ConfigError::UnknownDifficulty(s.to_string())),
        }
    }
}

/// Validated game configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    pub discount_tiers: TierTable,
    /// Entity speed multiplier
    pub game_speed: f32,
    pub difficulty: Difficulty,
    /// Lifetime plays per customer (0 = unlimited)
    pub max_plays_per_customer: u32,
    /// Plays per customer per day (0 = unlimited)
    pub max_plays_per_day: u32,
    /// Ruleset preset name
    pub game_type: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            discount_tiers: TierTable::default(),
            game_speed: 1.0,
            difficulty: Difficulty::Medium,
            max_plays_per_customer: 0,
            max_plays_per_day: 3,
            game_type: "runner".to_string(),
        }
    }
}

/// Configuration as it arrives over the wire
///
/// Each field decodes on its own, so a badly typed value only drops that
/// field. Tiers stay unvalidated here until `GameConfig::merge`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub discount_tiers: Option<Vec<DiscountTier>>,
    pub game_speed: Option<f32>,
    pub difficulty: Option<String>,
    pub max_plays_per_customer: Option<u32>,
    pub max_plays_per_day: Option<u32>,
    pub game_type: Option<String>,
}

impl RemoteConfig {
    /// Decode from a JSON value field by field.
    ///
    /// Returns the decoded fields plus every field that was present but malformed.
    pub fn from_value(value: &Value) -> (Self, Vec<(&'static str, ConfigError)>) {
        let mut rejected = Vec::new();
        let config = Self {
            discount_tiers: field(value, "discountTiers", &mut rejected),
            game_speed: field(value, "gameSpeed", &mut rejected),
            difficulty: field(value, "difficulty", &mut rejected),
            max_plays_per_customer: field(value, "maxPlaysPerCustomer", &mut rejected),
            max_plays_per_day: field(value, "maxPlaysPerDay", &mut rejected),
            game_type: field(value, "gameType", &mut rejected),
        };
        for (name, err) in &rejected {
            log::warn!("Config field {} not decoded ({}), using default", name, err);
        }
        (config, rejected)
    }
}

fn field<T: DeserializeOwned>(
    value: &Value,
    name: &'static str,
    rejected: &mut Vec<(&'static str, ConfigError)>,
) -> Option<T> {
    let raw = value.get(name).filter(|v| !v.is_null())?;
    match T::deserialize(raw) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            rejected.push((name, ConfigError::Malformed(err.to_string())));
            None
        }
    }
}

impl<'de> Deserialize<'de> for RemoteConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value).0)
    }
}

impl GameConfig {
    /// Merge a remote config over defaults field by field.
    ///
    /// Returns the merged config plus every field that fell back.
    pub fn merge(remote: RemoteConfig) -> (Self, Vec<(&'static str, ConfigError)>) {
        let mut config = Self::default();
        let mut rejected = Vec::new();

        if let Some(tiers) = remote.discount_tiers {
            match TierTable::new(tiers) {
                Ok(table) => config.discount_tiers = table,
                Err(err) => rejected.push(("discountTiers", err)),
            }
        }

        if let Some(speed) = remote.game_speed {
            if speed.is_finite() && speed > 0.0 {
                config.game_speed = speed;
            } else {
                rejected.push(("gameSpeed", ConfigError::InvalidSpeed(speed)));
            }
        }

        if let Some(difficulty) = remote.difficulty {
            match difficulty.parse::<Difficulty>() {
                Ok(d) => config.difficulty = d,
                Err(err) => rejected.push(("difficulty", err)),
            }
        }

        if let Some(max) = remote.max_plays_per_customer {
            config.max_plays_per_customer = max;
        }
        if let Some(max) = remote.max_plays_per_day {
            config.max_plays_per_day = max;
        }

        if let Some(game_type) = remote.game_type {
            if Ruleset::by_name(&game_type).is_some() {
                config.game_type = game_type;
            } else {
                rejected.push(("gameType", ConfigError::UnknownGameType(game_type)));
            }
        }

        for (field, err) in &rejected {
            log::warn!("Config field {} rejected ({}), using default", field, err);
        }

        (config, rejected)
    }

    /// Ruleset preset for this config, tuned by speed and difficulty
    pub fn ruleset(&self) -> Ruleset {
        Ruleset::by_name(&self.game_type)
            .unwrap_or_default()
            .tuned(self.game_speed, self.difficulty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_remote_is_default() {
        let (config, rejected) = GameConfig::merge(RemoteConfig::default());
        assert_eq!(config, GameConfig::default());
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_partial_remote_merges_over_defaults() {
        let json = r#"{"gameSpeed": 1.5, "difficulty": "hard", "maxPlaysPerDay": 1}"#;
        let remote: RemoteConfig = serde_json::from_str(json).unwrap();
        let (config, rejected) = GameConfig::merge(remote);

        assert!(rejected.is_empty());
        assert_eq!(config.game_speed, 1.5);
        assert_eq!(config.difficulty, Difficulty::Hard);
        assert_eq!(config.max_plays_per_day, 1);
        // Untouched fields keep defaults
        assert_eq!(config.discount_tiers, TierTable::default());
        assert_eq!(config.max_plays_per_customer, 0);
    }

    #[test]
    fn test_invalid_field_only_drops_that_field() {
        let json = r#"{
            "discountTiers": [{"minScore": 100, "discount": 5}, {"minScore": 50, "discount": 10}],
            "gameSpeed": -2.0,
            "gameType": "flyer"
        }"#;
        let remote: RemoteConfig = serde_json::from_str(json).unwrap();
        let (config, rejected) = GameConfig::merge(remote);

        let fields: Vec<_> = rejected.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec!["discountTiers", "gameSpeed"]);
        assert_eq!(config.discount_tiers, TierTable::default());
        assert_eq!(config.game_speed, 1.0);
        assert_eq!(config.game_type, "flyer");
    }

    #[test]
    fn test_badly_typed_field_keeps_the_rest() {
        let json = r#"{
            "discountTiers": [{"minScore": 0, "discount": 0}, {"minScore": 100, "discount": 12.5}],
            "gameSpeed": 1.5,
            "difficulty": "hard",
            "maxPlaysPerCustomer": -1,
            "maxPlaysPerDay": 2
        }"#;
        let value: Value = serde_json::from_str(json).unwrap();
        let (remote, malformed) = RemoteConfig::from_value(&value);
        let fields: Vec<_> = malformed.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec!["discountTiers", "maxPlaysPerCustomer"]);

        let remote_via_serde: RemoteConfig = serde_json::from_str(json).unwrap();
        assert_eq!(remote_via_serde, remote);

        let (config, rejected) = GameConfig::merge(remote);
        assert!(rejected.is_empty());
        assert_eq!(config.discount_tiers, TierTable::default());
        assert_eq!(config.game_speed, 1.5);
        assert_eq!(config.difficulty, Difficulty::Hard);
        assert_eq!(config.max_plays_per_customer, 0);
        assert_eq!(config.max_plays_per_day, 2);
    }

    #[test]
    fn test_unknown_game_type_rejected() {
        let remote = RemoteConfig {
            game_type: Some("pinball".into()),
            ..Default::default()
        };
        let (config, rejected) = GameConfig::merge(remote);
        assert_eq!(config.game_type, "runner");
        assert_eq!(
            rejected[0].1,
            ConfigError::UnknownGameType("pinball".into())
        );
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("EASY".parse(), Ok(Difficulty::Easy));
        assert_eq!("normal".parse(), Ok(Difficulty::Medium));
        assert_eq!(
            "nightmare".parse::<Difficulty>(),
            Err(ConfigError::UnknownDifficulty("nightmare".into()))
        );
        assert!(Difficulty::Hard.interval_factor() < Difficulty::Easy.interval_factor());
    }
}
