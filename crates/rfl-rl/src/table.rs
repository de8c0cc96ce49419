//! Sparse (state, action) value table and the one-step Q-learning update

use std::collections::HashMap;

use crate::state::{legal_actions, Action, OccupancyState, Reward};

/// Value assumed for any pair that has never been written
pub const DEFAULT_VALUE: f64 = 0.0;

/// Sparse mapping from `(state, action)` to an estimated value.
///
/// Values are grouped per state so lookups borrow the state instead of
/// building an owned key. Unseen pairs read as [`DEFAULT_VALUE`]; reads
/// never insert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueTable {
    values: HashMap<OccupancyState, HashMap<Action, f64>>,
}

impl ValueTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup with the lazy zero default
    pub fn get(&self, state: &OccupancyState, action: Action) -> f64 {
        self.values
            .get(state)
            .and_then(|row| row.get(&action))
            .copied()
            .unwrap_or(DEFAULT_VALUE)
    }

    /// Whether the pair has been written
    pub fn contains(&self, state: &OccupancyState, action: Action) -> bool {
        self.values
            .get(state)
            .is_some_and(|row| row.contains_key(&action))
    }

    pub fn set(&mut self, state: OccupancyState, action: Action, value: f64) {
        self.values.entry(state).or_default().insert(action, value);
    }

    /// Highest value over the legal actions of `state`.
    ///
    /// Always defined because defer is always legal.
    pub fn max_value(&self, state: &OccupancyState) -> f64 {
        let row = self.values.get(state);
        legal_actions(state)
            .into_iter()
            .map(|action| row_value(row, action))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Legal action with the highest value.
    ///
    /// Ties go to the earliest action in legal order (lowest channel,
    /// defer last). `Iterator::max_by` keeps the last maximum, so the scan
    /// is explicit.
    pub fn greedy_action(&self, state: &OccupancyState) -> Action {
        let row = self.values.get(state);
        let mut actions = legal_actions(state).into_iter();
        let mut best_action = actions.next().unwrap_or(Action::Defer);
        let mut best_value = row_value(row, best_action);
        for action in actions {
            let value = row_value(row, action);
            if value > best_value {
                best_action = action;
                best_value = value;
            }
        }
        best_action
    }

    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
    ///
    /// Returns the new value of `(state, action)`.
    pub fn q_learning_update(
        &mut self,
        state: &OccupancyState,
        action: Action,
        reward: Reward,
        next_state: &OccupancyState,
        learning_rate: f64,
        discount_factor: f64,
    ) -> f64 {
        let current = self.get(state, action);
        let max_next = self.max_value(next_state);
        let target = reward + discount_factor * max_next;
        let updated = current + learning_rate * (target - current);
        match self.values.get_mut(state) {
            Some(row) => {
                row.insert(action, updated);
            }
            None => self.set(state.clone(), action, updated),
        }
        updated
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.values.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(HashMap::is_empty)
    }

    /// Number of distinct states with at least one stored entry
    pub fn state_count(&self) -> usize {
        self.values.len()
    }

    /// All stored entries, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&OccupancyState, Action, f64)> {
        self.values.iter().flat_map(|(state, row)| {
            row.iter().map(move |(action, value)| (state, *action, *value))
        })
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

fn row_value(row: Option<&HashMap<Action, f64>>, action: Action) -> f64 {
    row.and_then(|row| row.get(&action))
        .copied()
        .unwrap_or(DEFAULT_VALUE)
}
