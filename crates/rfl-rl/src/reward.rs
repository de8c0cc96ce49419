//! Transmission outcome evaluation shared by every policy

use serde::{Deserialize, Serialize};

use rfl_core::RewardConfig;

use crate::state::{Action, OccupancyState, Reward};

/// Reward and collision flag for one transmission attempt
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransmissionOutcome {
    pub reward: Reward,
    pub collision: bool,
}

/// Score an action against the state it was chosen under.
///
/// Deferring earns the defer reward, transmitting on a busy channel earns
/// the collision penalty, and transmitting on an idle channel earns the
/// success reward. Identical for every policy.
pub fn evaluate_transmission(
    action: Action,
    state: &OccupancyState,
    rewards: &RewardConfig,
) -> TransmissionOutcome {
    match action {
        Action::Defer => TransmissionOutcome {
            reward: rewards.defer_reward,
            collision: false,
        },
        Action::Transmit(channel) if state.is_busy(channel) => TransmissionOutcome {
            reward: rewards.collision_penalty,
            collision: true,
        },
        Action::Transmit(_) => TransmissionOutcome {
            reward: rewards.success_reward,
            collision: false,
        },
    }
}
