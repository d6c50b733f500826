//! The [`Observer`] trait hooks into a running study.
//!
//! Closures taking a finished [`Generation`] are observers, which is enough
//! for progress reporting and early stopping:
//!
//! ```
//! use std::ops::ControlFlow;
//!
//! use spea2::{Generation, Observer};
//!
//! let stop_after_three = |g: &Generation| {
//!     if g.index >= 2 { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//! };
//! let g = Generation::new(2, Vec::new());
//! assert_eq!(stop_after_three.after_generation(&g), ControlFlow::Break(()));
//! ```

use core::ops::ControlFlow;

use crate::generation::Generation;
use crate::scheduler::EvaluationReport;

/// Lifecycle hooks called by [`Study::run`](crate::Study::run).
///
/// Both hooks default to no-ops.
pub trait Observer {
    /// Called after generation `index` has been evaluated, before scoring.
    fn after_evaluation(&self, _index: usize, _report: &EvaluationReport) {}

    /// Called after a generation has been scored, its archive selected and
    /// the generation stored.
    ///
    /// Return `ControlFlow::Break(())` to end the run after this generation.
    fn after_generation(&self, _generation: &Generation) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F> Observer for F
where
    F: Fn(&Generation) -> ControlFlow<()>,
{
    fn after_generation(&self, generation: &Generation) -> ControlFlow<()> {
        self(generation)
    }
}
