#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Constrained multi-objective parameter search with SPEA2, built for slow,
//! failure-prone black-box evaluations such as circuit simulations.
//!
//! # Getting Started
//!
//! Describe the design space, plug in an evaluator and run:
//!
//! ```
//! use std::path::Path;
//!
//! use spea2::prelude::*;
//!
//! let problem = Problem::builder()
//!     .variable("w", 0.0, 1.0)
//!     .variable("l", 0.0, 1.0)
//!     .maximize("gain")
//!     .maximize("bandwidth")
//!     .max_constraint("power", 1.5)
//!     .build()
//!     .unwrap();
//!
//! let evaluator = |p: &ParameterVector, _dir: &Path| -> std::result::Result<Outputs, EvaluationError> {
//!     let (w, l) = (p[0], p[1]);
//!     Ok(Outputs::from([
//!         ("gain".to_owned(), w * (1.0 - l)),
//!         ("bandwidth".to_owned(), l * (1.0 - w)),
//!         ("power".to_owned(), w + l),
//!     ]))
//! };
//!
//! let config = Spea2Config {
//!     population_size: 12,
//!     max_generations: 5,
//!     seed: Some(7),
//!     ..Spea2Config::default()
//! };
//!
//! let study = Study::builder(problem).config(config).evaluator(evaluator).build().unwrap();
//! let pool = study.run().unwrap();
//!
//! let last = pool.last().unwrap();
//! assert_eq!(last.archive.len(), 12);
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Problem`] | Named variables with bounds, targets with directions, constraints with bounds. |
//! | [`ParameterVector`] | One point of the design space. |
//! | [`Individual`] | A parameter vector with its measurements and fitness. |
//! | [`Generation`] | One iteration's population plus the archive selected from it. |
//! | [`Evaluator`] | The black box: parameter vector in, named outputs out. |
//! | [`Study`] | Drives the SPEA2 cycle and returns a [`GenerationPool`](storage::GenerationPool). |
//!
//! # Algorithm
//!
//! - [`fitness`]: dominance over direction-mapped targets, strength and raw
//!   fitness, k-th nearest-neighbour density, normalized constraint error.
//! - [`variation`]: binary tournament mating, blend crossover, uniform
//!   single-coordinate mutation.
//! - [`selection`]: environmental selection into an archive of exactly N.
//! - [`scheduler`]: concurrent evaluation with failure replacement over
//!   isolated [`workspace`] directories.
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `journal` | [`GenerationJournal`](storage::GenerationJournal): JSONL write-through of finished generations with file locking | off |
//! | `sobol` | `Initializer::QuasiMonteCarlo` for generation 0 | off |
//! | `tracing` | Structured log events and spans via [`tracing`](https://docs.rs/tracing) | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

pub mod config;
mod error;
pub mod evaluator;
pub mod fitness;
mod generation;
mod individual;
mod observer;
pub mod parameter;
pub mod problem;
pub mod scheduler;
pub mod selection;
pub mod storage;
mod study;
mod types;
pub mod variation;
pub mod workspace;

pub use config::{Initializer, RunConfig, Spea2Config, Truncation, VariationConfig};
pub use error::{Error, EvaluationError, Result};
pub use evaluator::{Evaluator, Outputs};
pub use generation::Generation;
pub use individual::{FitnessRecord, Individual, Measurements};
pub use observer::Observer;
pub use parameter::ParameterVector;
pub use problem::{Problem, ProblemBuilder};
pub use scheduler::EvaluationReport;
pub use study::{Study, StudyBuilder};
pub use types::{ConstraintKind, Direction, EvaluationStatus, Provenance};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use spea2::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{Initializer, RunConfig, Spea2Config, Truncation, VariationConfig};
    pub use crate::error::{Error, EvaluationError, Result};
    pub use crate::evaluator::{Evaluator, Outputs};
    pub use crate::generation::Generation;
    pub use crate::individual::{FitnessRecord, Individual, Measurements};
    pub use crate::observer::Observer;
    pub use crate::parameter::ParameterVector;
    pub use crate::problem::Problem;
    pub use crate::scheduler::EvaluationReport;
    #[cfg(feature = "journal")]
    pub use crate::storage::GenerationJournal;
    pub use crate::storage::{GenerationPool, StorageMode};
    pub use crate::study::{Study, StudyBuilder};
    pub use crate::types::{ConstraintKind, Direction, EvaluationStatus, Provenance};
    pub use crate::workspace::Workspace;
}
