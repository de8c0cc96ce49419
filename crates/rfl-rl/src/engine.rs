//! Agent facade and learner-vs-baseline comparison

use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use rfl_core::{AgentConfig, Result, RewardConfig, RflError};

use crate::algorithm::{ChannelPolicy, QLearning, RandomBaseline};
use crate::experience::{EpisodeHistory, Outcome, Statistics};
use crate::reward::{evaluate_transmission, TransmissionOutcome};
use crate::snapshot;
use crate::state::{classify, Action, OccupancyState, Reward};
use crate::table::ValueTable;

/// A policy plus the classifier that feeds it power readings
pub struct Agent {
    config: AgentConfig,
    policy: Box<dyn ChannelPolicy>,
}

impl Agent {
    pub fn new(config: AgentConfig, policy: Box<dyn ChannelPolicy>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, policy })
    }

    /// Epsilon-greedy learner; `seed` makes it reproducible
    pub fn q_learning(config: AgentConfig, seed: Option<u64>) -> Result<Self> {
        let policy = match seed {
            Some(seed) => QLearning::with_seed(config.clone(), seed)?,
            None => QLearning::new(config.clone())?,
        };
        Self::new(config, Box::new(policy))
    }

    /// Uniform-random baseline
    pub fn random(config: AgentConfig, seed: Option<u64>) -> Result<Self> {
        let policy = match seed {
            Some(seed) => RandomBaseline::with_seed(&config, seed)?,
            None => RandomBaseline::new(&config)?,
        };
        Self::new(config, Box::new(policy))
    }

    pub fn name(&self) -> &str {
        self.policy.name()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn policy(&self) -> &dyn ChannelPolicy {
        self.policy.as_ref()
    }

    /// Classify a reading with this agent's threshold
    pub fn observe(&self, reading: &[f64]) -> Result<OccupancyState> {
        classify(reading, self.config.power_threshold_db, self.config.num_channels)
    }

    /// Classify a reading and select an action for it
    pub fn observe_and_act(&mut self, reading: &[f64]) -> Result<Action> {
        let state = self.observe(reading)?;
        self.policy.select(&state)
    }

    /// Learn from the reading observed after acting
    pub fn learn(&mut self, reading: &[f64], reward: Reward, collision_occurred: bool) -> Result<Outcome> {
        let next_state = self.observe(reading)?;
        self.policy.update(&next_state, reward, collision_occurred)
    }

    pub fn statistics(&self) -> Statistics {
        self.policy.statistics()
    }

    pub fn history(&self) -> &EpisodeHistory {
        self.policy.history()
    }

    pub fn channel_usage(&self) -> Vec<u64> {
        self.policy.history().channel_usage()
    }

    pub fn exploration_rate(&self) -> Option<f64> {
        self.policy.exploration_rate()
    }

    /// Clear statistics and history; learned values are kept
    pub fn reset(&mut self) {
        self.policy.reset();
    }

    /// Save learned values; returns `false` for policies without a table
    pub fn save_snapshot(&self, path: &Path) -> Result<bool> {
        match self.policy.value_table() {
            Some(table) => {
                snapshot::save(table, self.config.num_channels, path)?;
                Ok(true)
            }
            None => {
                debug!("{} policy has no value table to save", self.name());
                Ok(false)
            }
        }
    }

    /// Strict load; the current table is untouched on error
    pub fn try_load_snapshot(&mut self, path: &Path) -> Result<()> {
        if self.policy.value_table().is_none() {
            debug!("{} policy has no value table to load", self.name());
            return Ok(());
        }
        let table = snapshot::load(path, self.config.num_channels)?;
        self.policy.replace_value_table(table);
        Ok(())
    }

    /// Load learned values, falling back to an empty table.
    ///
    /// Returns whether the snapshot was applied. Never fails.
    pub fn load_snapshot(&mut self, path: &Path) -> bool {
        match self.try_load_snapshot(path) {
            Ok(()) => self.policy.value_table().is_some(),
            Err(e) => {
                warn!("{}, starting with empty table", e);
                self.policy.replace_value_table(ValueTable::new());
                false
            }
        }
    }
}

/// Everything that happened to both agents in one step
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonStep {
    pub episode: u64,
    pub reading: Vec<f64>,
    pub state: OccupancyState,
    pub learner_action: Action,
    pub learner_outcome: TransmissionOutcome,
    pub baseline_action: Action,
    pub baseline_outcome: TransmissionOutcome,
}

/// Drives a learner and a baseline on the same stream of readings
pub struct Comparison {
    learner: Agent,
    baseline: Agent,
    rewards: RewardConfig,
    episodes: u64,
}

impl Comparison {
    /// Both agents must classify readings identically
    pub fn new(learner: Agent, baseline: Agent) -> Result<Self> {
        let (l, b) = (learner.config(), baseline.config());
        if l.num_channels != b.num_channels || l.power_threshold_db != b.power_threshold_db {
            return Err(RflError::Config(format!(
                "agents disagree on sensing: {} channels @ {} dB vs {} channels @ {} dB",
                l.num_channels, l.power_threshold_db, b.num_channels, b.power_threshold_db
            )));
        }
        let rewards = l.rewards;
        Ok(Self {
            learner,
            baseline,
            rewards,
            episodes: 0,
        })
    }

    /// Q-learning learner against a random baseline sharing one config
    pub fn with_config(config: AgentConfig, seed: Option<u64>) -> Result<Self> {
        let learner = Agent::q_learning(config.clone(), seed)?;
        // Distinct stream so the two agents do not draw identical numbers
        let baseline = Agent::random(config, seed.map(|s| s.wrapping_add(1)))?;
        Self::new(learner, baseline)
    }

    /// Run one observe -> act -> reward -> update cycle for both agents.
    ///
    /// The reading that produced the action also serves as the next state.
    pub fn step(&mut self, reading: &[f64]) -> Result<ComparisonStep> {
        let state = self.learner.observe(reading)?;

        let learner_action = self.learner.observe_and_act(reading)?;
        let baseline_action = self.baseline.observe_and_act(reading)?;

        let learner_outcome = evaluate_transmission(learner_action, &state, &self.rewards);
        let baseline_outcome = evaluate_transmission(baseline_action, &state, &self.rewards);

        self.learner
            .learn(reading, learner_outcome.reward, learner_outcome.collision)?;
        self.baseline
            .learn(reading, baseline_outcome.reward, baseline_outcome.collision)?;

        self.episodes += 1;
        debug!(
            "Episode {}: Q-Action={}, Q-Reward={:.2}, Q-Collision={}, R-Action={}, R-Reward={:.2}, R-Collision={}",
            self.episodes,
            learner_action,
            learner_outcome.reward,
            learner_outcome.collision,
            baseline_action,
            baseline_outcome.reward,
            baseline_outcome.collision
        );

        Ok(ComparisonStep {
            episode: self.episodes,
            reading: reading.to_vec(),
            state,
            learner_action,
            learner_outcome,
            baseline_action,
            baseline_outcome,
        })
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn learner(&self) -> &Agent {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut Agent {
        &mut self.learner
    }

    pub fn baseline(&self) -> &Agent {
        &self.baseline
    }

    /// Start a fresh evaluation window for both agents
    pub fn reset(&mut self) {
        self.learner.reset();
        self.baseline.reset();
        self.episodes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const READING: [f64; 5] = [-65.0, -45.0, -70.0, -50.0, -75.0];

    #[test]
    fn test_agent_observe_and_learn() {
        let mut agent = Agent::q_learning(AgentConfig::default(), Some(5)).unwrap();
        let action = agent.observe_and_act(&READING).unwrap();
        let state = agent.observe(&READING).unwrap();
        let outcome = evaluate_transmission(action, &state, &agent.config().rewards);
        agent.learn(&READING, outcome.reward, outcome.collision).unwrap();

        assert_eq!(agent.statistics().episode_count, 1);
        assert!(agent.exploration_rate().unwrap() < 1.0);
    }

    #[test]
    fn test_agent_rejects_short_reading() {
        let mut agent = Agent::random(AgentConfig::default(), Some(5)).unwrap();
        assert!(matches!(
            agent.observe_and_act(&[-65.0, -45.0]),
            Err(RflError::InputSizeMismatch { .. })
        ));
    }

    #[test]
    fn test_comparison_step_updates_both() {
        let mut comparison = Comparison::with_config(AgentConfig::default(), Some(9)).unwrap();
        let step = comparison.step(&READING).unwrap();

        assert_eq!(step.episode, 1);
        assert_eq!(step.state.as_slice(), &[false, true, false, true, false]);
        assert_eq!(comparison.learner().statistics().episode_count, 1);
        assert_eq!(comparison.baseline().statistics().episode_count, 1);
    }

    #[test]
    fn test_comparison_rejects_mismatched_agents() {
        let learner = Agent::q_learning(AgentConfig::default(), Some(1)).unwrap();
        let baseline = Agent::random(
            AgentConfig {
                num_channels: 4,
                ..AgentConfig::default()
            },
            Some(2),
        )
        .unwrap();
        assert!(matches!(
            Comparison::new(learner, baseline),
            Err(RflError::Config(_))
        ));
    }

    #[test]
    fn test_baseline_save_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q_table.json");
        let agent = Agent::random(AgentConfig::default(), Some(1)).unwrap();
        assert!(!agent.save_snapshot(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_missing_snapshot_leaves_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = Agent::q_learning(AgentConfig::default(), Some(1)).unwrap();
        assert!(!agent.load_snapshot(&dir.path().join("absent.json")));
        assert!(agent.policy().value_table().unwrap().is_empty());
    }
}
