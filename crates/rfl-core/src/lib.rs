//! RFL Core - Error type, agent configuration, and shared helpers
//!
//! This crate provides the foundational types used across all RFL components.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod types;
pub mod util;

pub use error::{Result, RflError};
pub use types::{AgentConfig, RewardConfig};
