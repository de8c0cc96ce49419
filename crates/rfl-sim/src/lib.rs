//! RFL Sim - drives a learner and a random baseline from a spectrum source
//!
//! The binary `rfld` wires these pieces together; they are exposed as a
//! library so the loop can be driven from tests.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]

pub mod config;
pub mod report;
pub mod runner;
pub mod spectrum;

pub use config::{Config, RunOverrides, SourceKind};
pub use report::{RunReport, StopReason};
pub use runner::Runner;
pub use spectrum::{ReplaySpectrum, SimulatedSpectrum, SpectrumSource};
