//! Occupancy states, actions, and the mapping from power readings to states

use std::fmt;

use serde::{Deserialize, Serialize};

use rfl_core::{Result, RflError};

/// Reward value reported for one transmission attempt
pub type Reward = f64;

/// Busy/idle pattern across all channels (`true` = busy)
///
/// Two readings that produce the same pattern are the same state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OccupancyState(Vec<bool>);

impl OccupancyState {
    pub fn new(busy: Vec<bool>) -> Self {
        Self(busy)
    }

    /// Every channel idle
    pub fn all_idle(num_channels: usize) -> Self {
        Self(vec![false; num_channels])
    }

    pub fn num_channels(&self) -> usize {
        self.0.len()
    }

    /// Whether `channel` is busy; channels outside the state count as busy
    pub fn is_busy(&self, channel: usize) -> bool {
        self.0.get(channel).copied().unwrap_or(true)
    }

    pub fn is_idle(&self, channel: usize) -> bool {
        !self.is_busy(channel)
    }

    /// Indices of idle channels in ascending order
    pub fn idle_channels(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, busy)| !**busy)
            .map(|(channel, _)| channel)
    }

    pub fn busy_count(&self) -> usize {
        self.0.iter().filter(|busy| **busy).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.0
    }

    /// Compact key with one `0` (idle) or `1` (busy) per channel
    pub fn to_key(&self) -> String {
        self.0.iter().map(|busy| if *busy { '1' } else { '0' }).collect()
    }

    /// Parse a key produced by [`OccupancyState::to_key`]
    pub fn from_key(key: &str, num_channels: usize) -> Option<Self> {
        if key.len() != num_channels {
            return None;
        }
        key.chars()
            .map(|c| match c {
                '0' => Some(false),
                '1' => Some(true),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }
}

impl fmt::Display for OccupancyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

/// What the agent does in one step
///
/// Variant order matters: the derived `Ord` puts every channel before
/// `Defer`, matching the legal-action ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Transmit on the given channel
    Transmit(usize),

    /// Do not transmit this step
    Defer,
}

impl Action {
    /// Convert to the integer encoding `0..N`, where `N` means defer
    pub fn to_index(self, num_channels: usize) -> usize {
        match self {
            Action::Transmit(channel) => channel,
            Action::Defer => num_channels,
        }
    }

    /// Decode the integer encoding; `None` for anything above `N`
    pub fn from_index(index: usize, num_channels: usize) -> Option<Self> {
        match index {
            i if i < num_channels => Some(Action::Transmit(i)),
            i if i == num_channels => Some(Action::Defer),
            _ => None,
        }
    }

    pub fn is_defer(self) -> bool {
        matches!(self, Action::Defer)
    }

    /// The channel transmitted on, if any
    pub fn channel(self) -> Option<usize> {
        match self {
            Action::Transmit(channel) => Some(channel),
            Action::Defer => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Transmit(channel) => write!(f, "ch{channel}"),
            Action::Defer => f.write_str("defer"),
        }
    }
}

/// Convert a power reading (dB per channel) into an occupancy state.
///
/// Channel `i` is busy iff `reading[i] > threshold_db`. The length is
/// checked before any comparison.
pub fn classify(reading: &[f64], threshold_db: f64, num_channels: usize) -> Result<OccupancyState> {
    if reading.len() != num_channels {
        return Err(RflError::InputSizeMismatch {
            expected: num_channels,
            actual: reading.len(),
        });
    }

    Ok(OccupancyState(
        reading.iter().map(|power| *power > threshold_db).collect(),
    ))
}

/// Legal actions for a state: idle channels ascending, then `Defer`.
///
/// Never empty.
pub fn legal_actions(state: &OccupancyState) -> Vec<Action> {
    state
        .idle_channels()
        .map(Action::Transmit)
        .chain(std::iter::once(Action::Defer))
        .collect()
}
