//! Channel selection policies
//!
//! Both policies follow the same strict cycle: one `select` must be
//! followed by exactly one `update` before the next `select`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use rfl_core::{AgentConfig, Result, RflError};

use crate::experience::{EpisodeHistory, Outcome, Statistics};
use crate::state::{legal_actions, Action, OccupancyState, Reward};
use crate::table::ValueTable;

/// Progress is logged every this many completed steps
const LOG_INTERVAL: u64 = 100;

/// Trait for channel selection policies
pub trait ChannelPolicy: Send + Sync {
    /// Policy name
    fn name(&self) -> &str;

    /// Choose an action for the observed state
    fn select(&mut self, state: &OccupancyState) -> Result<Action>;

    /// Reconcile the pending action with its reward and the next state
    fn update(
        &mut self,
        next_state: &OccupancyState,
        reward: Reward,
        collision_occurred: bool,
    ) -> Result<Outcome>;

    /// Episode history since construction or the last reset
    fn history(&self) -> &EpisodeHistory;

    /// Current exploration rate, if the policy explores
    fn exploration_rate(&self) -> Option<f64> {
        None
    }

    /// Learned values, if the policy keeps any
    fn value_table(&self) -> Option<&ValueTable> {
        None
    }

    /// Swap in a new value table; returns `false` when the policy has none
    fn replace_value_table(&mut self, _table: ValueTable) -> bool {
        false
    }

    /// Whether a `select` is waiting for its `update`
    fn is_awaiting_update(&self) -> bool;

    /// Clear statistics and history; learned values are kept
    fn reset(&mut self);

    /// Get policy parameters as JSON
    fn params(&self) -> serde_json::Value;

    /// Statistics rollup
    fn statistics(&self) -> Statistics {
        self.history().statistics(self.exploration_rate())
    }
}

fn build_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn check_state(state: &OccupancyState, num_channels: usize) -> Result<()> {
    if state.num_channels() == num_channels {
        Ok(())
    } else {
        Err(RflError::InputSizeMismatch {
            expected: num_channels,
            actual: state.num_channels(),
        })
    }
}

fn check_reward(reward: Reward) -> Result<()> {
    if reward.is_finite() {
        Ok(())
    } else {
        Err(RflError::InvalidValue(format!("reward must be finite, got {reward}")))
    }
}

fn take_pending(
    pending: &mut Option<(OccupancyState, Action)>,
) -> Result<(OccupancyState, Action)> {
    pending.take().ok_or_else(|| {
        RflError::Sequencing("update called without a preceding select".to_string())
    })
}

fn ensure_not_pending(pending: &Option<(OccupancyState, Action)>) -> Result<()> {
    match pending {
        Some((_, action)) => Err(RflError::Sequencing(format!(
            "select called while action {action} is still awaiting its update"
        ))),
        None => Ok(()),
    }
}

/// Epsilon-greedy tabular Q-learning
pub struct QLearning {
    config: AgentConfig,
    table: ValueTable,
    epsilon: f64,
    rng: StdRng,
    pending: Option<(OccupancyState, Action)>,
    history: EpisodeHistory,
}

impl QLearning {
    /// Create a policy with an entropy-seeded random source
    pub fn new(config: AgentConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a policy whose exploration draws are reproducible
    pub fn with_seed(config: AgentConfig, seed: u64) -> Result<Self> {
        Self::build(config, Some(seed))
    }

    fn build(config: AgentConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            table: ValueTable::new(),
            epsilon: config.initial_epsilon,
            rng: build_rng(seed),
            pending: None,
            history: EpisodeHistory::new(config.num_channels),
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn table(&self) -> &ValueTable {
        &self.table
    }

    fn decay_epsilon(&mut self) {
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.min_epsilon);
    }
}

impl ChannelPolicy for QLearning {
    fn name(&self) -> &str {
        "q_learning"
    }

    fn select(&mut self, state: &OccupancyState) -> Result<Action> {
        ensure_not_pending(&self.pending)?;
        check_state(state, self.config.num_channels)?;

        let actions = legal_actions(state);
        let action = if self.rng.gen::<f64>() < self.epsilon {
            // Explore: uniform over legal actions
            actions.choose(&mut self.rng).copied().unwrap_or(Action::Defer)
        } else {
            self.table.greedy_action(state)
        };

        self.pending = Some((state.clone(), action));
        Ok(action)
    }

    fn update(
        &mut self,
        next_state: &OccupancyState,
        reward: Reward,
        collision_occurred: bool,
    ) -> Result<Outcome> {
        check_state(next_state, self.config.num_channels)?;
        check_reward(reward)?;
        let (state, action) = take_pending(&mut self.pending)?;

        let value = self.table.q_learning_update(
            &state,
            action,
            reward,
            next_state,
            self.config.learning_rate,
            self.config.discount_factor,
        );
        self.decay_epsilon();

        debug!(
            "q_learning step: state={} action={} reward={:.2} value={:.4} epsilon={:.4}",
            state, action, reward, value, self.epsilon
        );

        let outcome = self.history.record(state, action, reward, collision_occurred);

        let episodes = self.history.episode_count();
        if episodes % LOG_INTERVAL == 0 {
            info!(
                "Episode {}: Total Reward={:.2}, Collision Rate={:.3}, Epsilon={:.3}",
                episodes,
                self.history.total_reward(),
                self.history.collision_rate(),
                self.epsilon
            );
        }

        Ok(outcome)
    }

    fn history(&self) -> &EpisodeHistory {
        &self.history
    }

    fn exploration_rate(&self) -> Option<f64> {
        Some(self.epsilon)
    }

    fn value_table(&self) -> Option<&ValueTable> {
        Some(&self.table)
    }

    fn replace_value_table(&mut self, table: ValueTable) -> bool {
        self.table = table;
        true
    }

    fn is_awaiting_update(&self) -> bool {
        self.pending.is_some()
    }

    /// Also restores the initial exploration rate
    fn reset(&mut self) {
        self.history.reset();
        self.pending = None;
        self.epsilon = self.config.initial_epsilon;
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "learning_rate": self.config.learning_rate,
            "discount_factor": self.config.discount_factor,
            "epsilon": self.epsilon,
            "epsilon_decay": self.config.epsilon_decay,
            "min_epsilon": self.config.min_epsilon,
            "q_table_size": self.table.len()
        })
    }
}

/// Uniform-random baseline over legal actions; never learns
pub struct RandomBaseline {
    num_channels: usize,
    rng: StdRng,
    pending: Option<(OccupancyState, Action)>,
    history: EpisodeHistory,
}

impl RandomBaseline {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        Self::build(config, None)
    }

    pub fn with_seed(config: &AgentConfig, seed: u64) -> Result<Self> {
        Self::build(config, Some(seed))
    }

    fn build(config: &AgentConfig, seed: Option<u64>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            num_channels: config.num_channels,
            rng: build_rng(seed),
            pending: None,
            history: EpisodeHistory::new(config.num_channels),
        })
    }
}

impl ChannelPolicy for RandomBaseline {
    fn name(&self) -> &str {
        "random"
    }

    fn select(&mut self, state: &OccupancyState) -> Result<Action> {
        ensure_not_pending(&self.pending)?;
        check_state(state, self.num_channels)?;

        let action = legal_actions(state)
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(Action::Defer);

        self.pending = Some((state.clone(), action));
        Ok(action)
    }

    fn update(
        &mut self,
        next_state: &OccupancyState,
        reward: Reward,
        collision_occurred: bool,
    ) -> Result<Outcome> {
        check_state(next_state, self.num_channels)?;
        check_reward(reward)?;
        let (state, action) = take_pending(&mut self.pending)?;

        let outcome = self.history.record(state, action, reward, collision_occurred);

        let episodes = self.history.episode_count();
        if episodes % LOG_INTERVAL == 0 {
            info!(
                "Random Agent Episode {}: Total Reward={:.2}, Collision Rate={:.3}",
                episodes,
                self.history.total_reward(),
                self.history.collision_rate()
            );
        }

        Ok(outcome)
    }

    fn history(&self) -> &EpisodeHistory {
        &self.history
    }

    fn is_awaiting_update(&self) -> bool {
        self.pending.is_some()
    }

    fn reset(&mut self) {
        self.history.reset();
        self.pending = None;
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greedy_config() -> AgentConfig {
        AgentConfig {
            initial_epsilon: 0.0,
            min_epsilon: 0.0,
            ..AgentConfig::default()
        }
    }

    fn mixed_state() -> OccupancyState {
        OccupancyState::new(vec![false, true, false, true, false])
    }

    #[test]
    fn test_greedy_tie_break_selects_lowest_channel() {
        let mut policy = QLearning::with_seed(greedy_config(), 7).unwrap();
        assert_eq!(policy.select(&mixed_state()).unwrap(), Action::Transmit(0));
    }

    #[test]
    fn test_update_without_select_fails() {
        let mut policy = QLearning::with_seed(greedy_config(), 7).unwrap();
        let err = policy.update(&mixed_state(), 1.0, false).unwrap_err();
        assert!(matches!(err, RflError::Sequencing(_)));
        assert_eq!(policy.history().episode_count(), 0);
    }

    #[test]
    fn test_double_select_fails() {
        let mut policy = QLearning::with_seed(greedy_config(), 7).unwrap();
        policy.select(&mixed_state()).unwrap();
        let err = policy.select(&mixed_state()).unwrap_err();
        assert!(matches!(err, RflError::Sequencing(_)));
        assert!(policy.is_awaiting_update());
    }

    #[test]
    fn test_select_rejects_wrong_length() {
        let mut policy = QLearning::with_seed(greedy_config(), 7).unwrap();
        let err = policy.select(&OccupancyState::all_idle(3)).unwrap_err();
        assert!(matches!(err, RflError::InputSizeMismatch { .. }));
        assert!(!policy.is_awaiting_update());
    }

    #[test]
    fn test_update_applies_bellman_rule() {
        let mut policy = QLearning::with_seed(greedy_config(), 7).unwrap();
        let state = mixed_state();
        let action = policy.select(&state).unwrap();
        policy.update(&state, 1.0, false).unwrap();

        // 0 + 0.1 * (1.0 + 0.9 * 0.0 - 0) = 0.1
        assert!((policy.table().get(&state, action) - 0.1).abs() < 1e-12);
        assert!(!policy.is_awaiting_update());
    }

    #[test]
    fn test_epsilon_decays_to_floor() {
        let config = AgentConfig {
            initial_epsilon: 1.0,
            epsilon_decay: 0.5,
            min_epsilon: 0.2,
            ..AgentConfig::default()
        };
        let mut policy = QLearning::with_seed(config, 1).unwrap();
        let state = mixed_state();
        let expected = [0.5, 0.25, 0.2, 0.2];
        for eps in expected {
            policy.select(&state).unwrap();
            policy.update(&state, 0.0, false).unwrap();
            assert_eq!(policy.epsilon(), eps);
        }
    }

    #[test]
    fn test_reset_keeps_table_restores_epsilon() {
        let mut policy = QLearning::with_seed(AgentConfig::default(), 3).unwrap();
        let state = mixed_state();
        for _ in 0..10 {
            policy.select(&state).unwrap();
            policy.update(&state, 1.0, false).unwrap();
        }
        let entries = policy.table().len();
        assert!(entries > 0);
        assert!(policy.epsilon() < 1.0);

        policy.reset();

        assert_eq!(policy.table().len(), entries);
        assert_eq!(policy.epsilon(), 1.0);
        assert_eq!(policy.statistics().episode_count, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AgentConfig {
            num_channels: 0,
            ..AgentConfig::default()
        };
        assert!(matches!(QLearning::new(config.clone()), Err(RflError::Config(_))));
        assert!(matches!(RandomBaseline::new(&config), Err(RflError::Config(_))));
    }

    #[test]
    fn test_random_baseline_only_picks_legal_actions() {
        let mut policy = RandomBaseline::with_seed(&AgentConfig::default(), 11).unwrap();
        let state = mixed_state();
        let legal = legal_actions(&state);
        for _ in 0..200 {
            let action = policy.select(&state).unwrap();
            assert!(legal.contains(&action));
            policy.update(&state, 0.0, false).unwrap();
        }
        assert_eq!(policy.history().episode_count(), 200);
    }

    #[test]
    fn test_random_baseline_has_no_table() {
        let mut policy = RandomBaseline::with_seed(&AgentConfig::default(), 11).unwrap();
        assert!(policy.value_table().is_none());
        assert!(policy.exploration_rate().is_none());
        assert!(!policy.replace_value_table(ValueTable::new()));
    }

    #[test]
    fn test_random_baseline_sequencing() {
        let mut policy = RandomBaseline::with_seed(&AgentConfig::default(), 11).unwrap();
        assert!(matches!(
            policy.update(&mixed_state(), 0.0, false),
            Err(RflError::Sequencing(_))
        ));
    }

    #[test]
    fn test_non_finite_reward_rejected() {
        let mut policy = QLearning::with_seed(AgentConfig::default(), 7).unwrap();
        let state = mixed_state();
        let action = policy.select(&state).unwrap();

        for reward in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                policy.update(&state, reward, false),
                Err(RflError::InvalidValue(_))
            ));
        }
        assert!(policy.is_awaiting_update());
        assert_eq!(policy.history().episode_count(), 0);
        assert!(policy.table().is_empty());
        assert_eq!(policy.epsilon(), 1.0);

        // The pending pair is still there for a valid reward
        policy.update(&state, 1.0, false).unwrap();
        assert!((policy.table().get(&state, action) - 0.1).abs() < 1e-12);
        assert_eq!(policy.history().total_reward(), 1.0);
    }

    #[test]
    fn test_random_baseline_rejects_non_finite_reward() {
        let mut policy = RandomBaseline::with_seed(&AgentConfig::default(), 11).unwrap();
        policy.select(&mixed_state()).unwrap();
        assert!(matches!(
            policy.update(&mixed_state(), f64::NAN, false),
            Err(RflError::InvalidValue(_))
        ));
        assert!(policy.is_awaiting_update());

        policy.update(&mixed_state(), 0.0, false).unwrap();
        assert_eq!(policy.history().episode_count(), 1);
        assert_eq!(policy.history().total_reward(), 0.0);
    }

    #[test]
    fn test_same_seed_same_choices() {
        let state = mixed_state();
        let mut a = QLearning::with_seed(AgentConfig::default(), 42).unwrap();
        let mut b = QLearning::with_seed(AgentConfig::default(), 42).unwrap();
        for _ in 0..50 {
            let action_a = a.select(&state).unwrap();
            let action_b = b.select(&state).unwrap();
            assert_eq!(action_a, action_b);
            a.update(&state, 1.0, false).unwrap();
            b.update(&state, 1.0, false).unwrap();
        }
    }

    #[test]
    fn test_params() {
        let policy = QLearning::with_seed(AgentConfig::default(), 1).unwrap();
        let params = policy.params();
        assert_eq!(params["learning_rate"], 0.1);
        assert_eq!(params["q_table_size"], 0);
    }
}
