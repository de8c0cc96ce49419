//! Per-episode history and running statistics

use serde::{Deserialize, Serialize};

use crate::state::{Action, OccupancyState, Reward};

/// How a completed step is counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Collision,
    Defer,
}

impl Outcome {
    /// Classify by the collision flag first, then by action identity.
    ///
    /// The reward is never consulted: the defer reward may equal other
    /// rewards.
    pub fn classify(action: Action, collision_occurred: bool) -> Self {
        if collision_occurred {
            Outcome::Collision
        } else if action.is_defer() {
            Outcome::Defer
        } else {
            Outcome::Success
        }
    }
}

/// One completed step, reassembled from the parallel histories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub state: OccupancyState,
    pub action: Action,
    pub reward: Reward,
    pub collision: bool,
}

/// Read-only statistics rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_reward: f64,
    pub average_reward: f64,
    pub collision_rate: f64,
    pub success_rate: f64,
    pub defer_rate: f64,
    pub episode_count: u64,
    pub success_count: u64,
    pub collision_count: u64,
    pub defer_count: u64,
    /// Current epsilon; `None` for policies without exploration
    pub exploration_rate: Option<f64>,
}

/// Append-only step history with running counters.
///
/// The four history vectors always have length `episode_count`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeHistory {
    num_channels: usize,
    actions: Vec<Action>,
    rewards: Vec<Reward>,
    states: Vec<OccupancyState>,
    collisions: Vec<bool>,
    total_reward: f64,
    success_count: u64,
    collision_count: u64,
    defer_count: u64,
}

impl EpisodeHistory {
    pub fn new(num_channels: usize) -> Self {
        Self {
            num_channels,
            actions: Vec::new(),
            rewards: Vec::new(),
            states: Vec::new(),
            collisions: Vec::new(),
            total_reward: 0.0,
            success_count: 0,
            collision_count: 0,
            defer_count: 0,
        }
    }

    /// Record a completed step and return how it was counted
    pub fn record(
        &mut self,
        state: OccupancyState,
        action: Action,
        reward: Reward,
        collision_occurred: bool,
    ) -> Outcome {
        let outcome = Outcome::classify(action, collision_occurred);
        match outcome {
            Outcome::Success => self.success_count += 1,
            Outcome::Collision => self.collision_count += 1,
            Outcome::Defer => self.defer_count += 1,
        }
        self.total_reward += reward;

        self.actions.push(action);
        self.rewards.push(reward);
        self.states.push(state);
        self.collisions.push(collision_occurred);

        outcome
    }

    pub fn episode_count(&self) -> u64 {
        self.actions.len() as u64
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn rewards(&self) -> &[Reward] {
        &self.rewards
    }

    pub fn states(&self) -> &[OccupancyState] {
        &self.states
    }

    pub fn collisions(&self) -> &[bool] {
        &self.collisions
    }

    /// Iterate over completed steps in order
    pub fn records(&self) -> impl Iterator<Item = EpisodeRecord> + '_ {
        self.states
            .iter()
            .zip(&self.actions)
            .zip(&self.rewards)
            .zip(&self.collisions)
            .map(|(((state, action), reward), collision)| EpisodeRecord {
                state: state.clone(),
                action: *action,
                reward: *reward,
                collision: *collision,
            })
    }

    pub fn collision_rate(&self) -> f64 {
        self.per_episode(self.collision_count as f64)
    }

    pub fn success_rate(&self) -> f64 {
        self.per_episode(self.success_count as f64)
    }

    pub fn defer_rate(&self) -> f64 {
        self.per_episode(self.defer_count as f64)
    }

    /// `total / episode_count`, or 0 before the first episode
    fn per_episode(&self, total: f64) -> f64 {
        let episodes = self.episode_count();
        if episodes == 0 {
            0.0
        } else {
            total / episodes as f64
        }
    }

    /// Transmit count per channel index; defers are not counted
    pub fn channel_usage(&self) -> Vec<u64> {
        let mut usage = vec![0; self.num_channels];
        for channel in self.actions.iter().filter_map(|action| action.channel()) {
            if let Some(count) = usage.get_mut(channel) {
                *count += 1;
            }
        }
        usage
    }

    pub fn statistics(&self, exploration_rate: Option<f64>) -> Statistics {
        Statistics {
            total_reward: self.total_reward,
            average_reward: self.per_episode(self.total_reward),
            collision_rate: self.collision_rate(),
            success_rate: self.success_rate(),
            defer_rate: self.defer_rate(),
            episode_count: self.episode_count(),
            success_count: self.success_count,
            collision_count: self.collision_count,
            defer_count: self.defer_count,
            exploration_rate,
        }
    }

    /// Clear counters and histories
    pub fn reset(&mut self) {
        *self = Self::new(self.num_channels);
    }
}
