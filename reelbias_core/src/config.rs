use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fairness baseline the house edge is subtracted from.
pub const FAIR_WIN_CHANCE: f64 = 50.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within 0..=100, got {value}")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Tunable bias parameters, all in percent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlgorithmConfig {
    pub house_edge_percent: f64,
    pub false_hope_percent: f64,
    pub big_loss_protection_percent: f64,
    pub near_miss_rate_percent: f64,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            house_edge_percent: 15.0,
            false_hope_percent: 30.0,
            big_loss_protection_percent: 80.0,
            near_miss_rate_percent: 25.0,
        }
    }
}

impl AlgorithmConfig {
    /// Chance of a lucky win on the shared draw, before any override rule.
    pub fn base_win_chance(&self) -> f64 {
        FAIR_WIN_CHANCE - self.house_edge_percent
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("house_edge_percent", self.house_edge_percent),
            ("false_hope_percent", self.false_hope_percent),
            ("big_loss_protection_percent", self.big_loss_protection_percent),
            ("near_miss_rate_percent", self.near_miss_rate_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// Returns the config with `patch` applied, leaving `self` untouched if the
    /// result is invalid.
    pub fn patched(&self, patch: &AlgorithmConfigPatch) -> Result<Self, ConfigError> {
        let next = Self {
            house_edge_percent: patch.house_edge_percent.unwrap_or(self.house_edge_percent),
            false_hope_percent: patch.false_hope_percent.unwrap_or(self.false_hope_percent),
            big_loss_protection_percent: patch
                .big_loss_protection_percent
                .unwrap_or(self.big_loss_protection_percent),
            near_miss_rate_percent: patch
                .near_miss_rate_percent
                .unwrap_or(self.near_miss_rate_percent),
        };
        next.validate()?;
        Ok(next)
    }
}

/// Partial update for [`AlgorithmConfig`]; `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlgorithmConfigPatch {
    pub house_edge_percent: Option<f64>,
    pub false_hope_percent: Option<f64>,
    pub big_loss_protection_percent: Option<f64>,
    pub near_miss_rate_percent: Option<f64>,
}

/// Cosmetic timing of a spin and of auto-replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinTiming {
    pub shuffle_tick: Duration,
    pub shuffle_ticks: u32,
    pub auto_replay_delay: Duration,
}

impl Default for SpinTiming {
    fn default() -> Self {
        Self {
            shuffle_tick: Duration::from_millis(100),
            shuffle_ticks: 20,
            auto_replay_delay: Duration::from_millis(1_500),
        }
    }
}

impl SpinTiming {
    pub fn instant() -> Self {
        Self {
            shuffle_tick: Duration::ZERO,
            shuffle_ticks: 0,
            auto_replay_delay: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_win_chance() {
        assert_eq!(AlgorithmConfig::default().base_win_chance(), 35.0);
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let cfg = AlgorithmConfig::default();
        let patch = AlgorithmConfigPatch {
            false_hope_percent: Some(100.0),
            ..Default::default()
        };
        let next = cfg.patched(&patch).unwrap();
        assert_eq!(next.false_hope_percent, 100.0);
        assert_eq!(next.house_edge_percent, cfg.house_edge_percent);
        assert_eq!(next.near_miss_rate_percent, cfg.near_miss_rate_percent);
    }

    #[test]
    fn patch_rejects_out_of_range() {
        let patch = AlgorithmConfigPatch {
            near_miss_rate_percent: Some(140.0),
            ..Default::default()
        };
        assert_eq!(
            AlgorithmConfig::default().patched(&patch),
            Err(ConfigError::OutOfRange {
                field: "near_miss_rate_percent",
                value: 140.0
            })
        );
        let nan = AlgorithmConfigPatch {
            house_edge_percent: Some(f64::NAN),
            ..Default::default()
        };
        assert!(AlgorithmConfig::default().patched(&nan).is_err());
    }

    #[test]
    fn partial_json_patch() {
        let patch: AlgorithmConfigPatch =
            serde_json::from_str(r#"{"house_edge_percent": 20}"#).unwrap();
        assert_eq!(patch.house_edge_percent, Some(20.0));
        assert_eq!(patch.false_hope_percent, None);
    }
}
