//! Tunable engine parameters, loadable from RON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid combat factor range [{min}, {max}]")]
    FactorRange { min: f64, max: f64 },
}

/// Combat resolution: `power = strength + defense + health / 10`,
/// scaled by a uniform factor in `[factor_min, factor_max]`; victory
/// when power exceeds `victory_threshold`. Missing stats fall back to
/// the `default_*` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub factor_min: f64,
    pub factor_max: f64,
    pub victory_threshold: f64,
    pub default_strength: f64,
    pub default_defense: f64,
    pub default_health: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            factor_min: 0.8,
            factor_max: 1.2,
            victory_threshold: 50.0,
            default_strength: 10.0,
            default_defense: 5.0,
            default_health: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub combat: CombatConfig,
    /// How long a random event's outcome is shown before moving on.
    pub random_event_delay_secs: u64,
    pub end_speaker: String,
    pub end_text: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            combat: CombatConfig::default(),
            random_event_delay_secs: 2,
            end_speaker: "Game Over".to_string(),
            end_text: "The story ends here.".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn load_from_ron(path: &Path) -> Result<EngineConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse a config; omitted fields keep their defaults.
    pub fn parse_ron(input: &str) -> Result<EngineConfig, ConfigError> {
        let config: EngineConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let CombatConfig {
            factor_min: min,
            factor_max: max,
            ..
        } = self.combat;
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(ConfigError::FactorRange { min, max });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_preview_engine() {
        let config = EngineConfig::default();
        assert_eq!(config.combat.factor_min, 0.8);
        assert_eq!(config.combat.factor_max, 1.2);
        assert_eq!(config.combat.victory_threshold, 50.0);
        assert_eq!(config.random_event_delay_secs, 2);
        assert_eq!(config.end_text, "The story ends here.");
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let config = EngineConfig::parse_ron(
            "(combat: (factor_min: 0.9, factor_max: 1.1), end_speaker: \"Fin\")",
        )
        .unwrap();
        assert_eq!(config.combat.factor_min, 0.9);
        assert_eq!(config.combat.factor_max, 1.1);
        assert_eq!(config.combat.default_health, 100.0);
        assert_eq!(config.end_speaker, "Fin");
        assert_eq!(config.random_event_delay_secs, 2);
    }

    #[test]
    fn inverted_factor_range_is_rejected() {
        let err = EngineConfig::parse_ron("(combat: (factor_min: 1.5, factor_max: 1.0))")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FactorRange { .. }));
    }
}
