//! Configuration types shared by every RFL agent

use serde::{Deserialize, Serialize};

use crate::error::{Result, RflError};

/// Rewards handed out by the transmission outcome evaluator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Reward for transmitting on an idle channel
    pub success_reward: f64,
    /// Penalty for transmitting on a busy channel
    pub collision_penalty: f64,
    /// Reward for choosing not to transmit
    pub defer_reward: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            success_reward: 1.0,
            collision_penalty: -1.0,
            defer_reward: 0.0,
        }
    }
}

/// Immutable configuration for one channel-selection agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Number of monitored channels (N)
    pub num_channels: usize,
    /// A channel is busy when its power is strictly above this level (dB)
    pub power_threshold_db: f64,
    /// Learning rate α
    pub learning_rate: f64,
    /// Discount factor γ
    pub discount_factor: f64,
    pub initial_epsilon: f64,
    /// Multiplicative decay applied after every update
    pub epsilon_decay: f64,
    pub min_epsilon: f64,
    pub rewards: RewardConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            num_channels: 5,
            power_threshold_db: -60.0,
            learning_rate: 0.1,
            discount_factor: 0.9,
            initial_epsilon: 1.0,
            epsilon_decay: 0.995,
            min_epsilon: 0.01,
            rewards: RewardConfig::default(),
        }
    }
}

impl AgentConfig {
    /// The action index meaning "do not transmit"
    pub fn defer_action(&self) -> usize {
        self.num_channels
    }

    /// Reject out-of-range parameters before any step runs
    pub fn validate(&self) -> Result<()> {
        if self.num_channels == 0 {
            return Err(RflError::Config(
                "num_channels must be greater than zero".to_string(),
            ));
        }
        if !self.power_threshold_db.is_finite() {
            return Err(RflError::Config(format!(
                "power_threshold_db must be finite, got {}",
                self.power_threshold_db
            )));
        }

        check_unit_interval("learning_rate", self.learning_rate)?;
        check_unit_interval("discount_factor", self.discount_factor)?;
        check_unit_interval("initial_epsilon", self.initial_epsilon)?;
        check_unit_interval("min_epsilon", self.min_epsilon)?;

        if self.min_epsilon > self.initial_epsilon {
            return Err(RflError::Config(format!(
                "min_epsilon ({}) must not exceed initial_epsilon ({})",
                self.min_epsilon, self.initial_epsilon
            )));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return Err(RflError::Config(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            )));
        }

        let rewards = [
            ("success_reward", self.rewards.success_reward),
            ("collision_penalty", self.rewards.collision_penalty),
            ("defer_reward", self.rewards.defer_reward),
        ];
        for (name, value) in rewards {
            if !value.is_finite() {
                return Err(RflError::Config(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }

        Ok(())
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<()> {
    // NaN fails both comparisons
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RflError::Config(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.num_channels, 5);
        assert_eq!(config.defer_action(), 5);
        assert_eq!(config.power_threshold_db, -60.0);
    }

    #[test]
    fn test_default_rewards() {
        let rewards = RewardConfig::default();
        assert_eq!(rewards.success_reward, 1.0);
        assert_eq!(rewards.collision_penalty, -1.0);
        assert_eq!(rewards.defer_reward, 0.0);
    }

    #[test]
    fn test_zero_channels_rejected() {
        let config = AgentConfig {
            num_channels: 0,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(RflError::Config(_))));
    }

    #[test]
    fn test_negative_learning_rate_rejected() {
        let config = AgentConfig {
            learning_rate: -0.1,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(RflError::Config(_))));
    }

    #[test]
    fn test_nan_discount_rejected() {
        let config = AgentConfig {
            discount_factor: f64::NAN,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_epsilon_above_initial_rejected() {
        let config = AgentConfig {
            initial_epsilon: 0.05,
            min_epsilon: 0.1,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_epsilon_decay_bounds() {
        let zero = AgentConfig {
            epsilon_decay: 0.0,
            ..AgentConfig::default()
        };
        assert!(zero.validate().is_err());

        let one = AgentConfig {
            epsilon_decay: 1.0,
            ..AgentConfig::default()
        };
        assert!(one.validate().is_ok());
    }

    #[test]
    fn test_infinite_reward_rejected() {
        let config = AgentConfig {
            rewards: RewardConfig {
                collision_penalty: f64::NEG_INFINITY,
                ..RewardConfig::default()
            },
            ..AgentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pure_exploitation_is_valid() {
        let config = AgentConfig {
            initial_epsilon: 0.0,
            min_epsilon: 0.0,
            ..AgentConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AgentConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AgentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: AgentConfig = serde_json::from_str(r#"{"num_channels": 8}"#).unwrap();
        assert_eq!(parsed.num_channels, 8);
        assert_eq!(parsed.learning_rate, 0.1);
        assert_eq!(parsed.rewards, RewardConfig::default());
    }
}
