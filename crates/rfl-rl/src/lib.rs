//! RFL RL - Channel selection learning engine
//!
//! This crate turns per-channel power readings into occupancy states,
//! chooses which channel to transmit on (or to defer), and learns from
//! the outcome with a tabular Q-learning rule. A uniform-random baseline
//! shares the same interface for side-by-side evaluation.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithm;
pub mod engine;
pub mod experience;
pub mod reward;
pub mod snapshot;
pub mod state;
pub mod table;

pub use algorithm::{ChannelPolicy, QLearning, RandomBaseline};
pub use engine::{Agent, Comparison, ComparisonStep};
pub use experience::{EpisodeHistory, Outcome, Statistics};
pub use reward::{evaluate_transmission, TransmissionOutcome};
pub use state::{classify, legal_actions, Action, OccupancyState, Reward};
pub use table::ValueTable;
