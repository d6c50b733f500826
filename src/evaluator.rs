//! The [`Evaluator`] trait wraps the black box that measures a design.
//!
//! An evaluator receives a parameter vector and a private working directory
//! and returns every target and constraint value by name. Plain closures
//! work:
//!
//! ```
//! use std::path::Path;
//!
//! use spea2::{EvaluationError, Evaluator, Outputs, ParameterVector};
//!
//! let evaluator = |params: &ParameterVector, _dir: &Path| -> Result<Outputs, EvaluationError> {
//!     let x = params[0];
//!     Ok(Outputs::from([("gain".to_owned(), x * 2.0)]))
//! };
//!
//! let params = ParameterVector::new(vec![1.5]).unwrap();
//! let outputs = evaluator.evaluate(&params, Path::new(".")).unwrap();
//! assert_eq!(outputs["gain"], 3.0);
//! ```
//!
//! Return [`EvaluationError::Failed`] when the design cannot be measured
//! (a non-convergent simulation, unparsable output). The scheduler replaces
//! the individual and retries. Any other error aborts the run.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, EvaluationError, Result};
use crate::individual::Measurements;
use crate::parameter::ParameterVector;
use crate::problem::Problem;

/// Named target and constraint values produced by one evaluation.
pub type Outputs = HashMap<String, f64>;

/// Measures one parameter vector.
///
/// Implementations must be `Send + Sync`: with concurrency above 1 several
/// calls run at once, each with a different `workdir`. A working directory
/// is never shared by two running calls.
pub trait Evaluator: Send + Sync {
    /// Evaluate `params` using files in `workdir`.
    ///
    /// # Errors
    ///
    /// [`EvaluationError::Failed`] for recoverable measurement failures,
    /// [`EvaluationError::Unexpected`] for anything that should stop the run.
    fn evaluate(
        &self,
        params: &ParameterVector,
        workdir: &Path,
    ) -> core::result::Result<Outputs, EvaluationError>;
}

impl<F> Evaluator for F
where
    F: Fn(&ParameterVector, &Path) -> core::result::Result<Outputs, EvaluationError> + Send + Sync,
{
    fn evaluate(
        &self,
        params: &ParameterVector,
        workdir: &Path,
    ) -> core::result::Result<Outputs, EvaluationError> {
        self(params, workdir)
    }
}

/// Order `outputs` by the problem's targets and constraints.
///
/// Returns `Ok(None)` if a value is NaN or infinite, or a minimized target
/// is zero so its reciprocal is not finite. Both count as a failed
/// measurement.
///
/// # Errors
///
/// Returns [`Error::MissingOutput`] if a configured name is absent.
pub fn resolve(problem: &Problem, outputs: &Outputs) -> Result<Option<Measurements>> {
    let lookup = |name: &str| -> Result<f64> {
        outputs
            .get(name)
            .copied()
            .ok_or_else(|| Error::MissingOutput(name.to_owned()))
    };
    let targets = problem
        .targets()
        .iter()
        .map(|t| lookup(&t.name))
        .collect::<Result<Vec<f64>>>()?;
    let constraints = problem
        .constraints()
        .iter()
        .map(|c| lookup(&c.name))
        .collect::<Result<Vec<f64>>>()?;

    if targets.iter().chain(&constraints).any(|v| !v.is_finite()) {
        return Ok(None);
    }
    if problem
        .targets()
        .iter()
        .zip(&targets)
        .any(|(t, &v)| !t.direction.oriented(v).is_finite())
    {
        return Ok(None);
    }
    Ok(Some(Measurements {
        targets,
        constraints,
    }))
}

/// Run one evaluation and classify the outcome.
///
/// `Ok(None)` is a recoverable failure; errors are fatal.
pub(crate) fn measure(
    evaluator: &dyn Evaluator,
    problem: &Problem,
    params: &ParameterVector,
    workdir: &Path,
) -> Result<Option<Measurements>> {
    match evaluator.evaluate(params, workdir) {
        Ok(outputs) => resolve(problem, &outputs),
        Err(EvaluationError::Failed(_reason)) => {
            trace_debug!(reason = %_reason, "evaluation failed");
            Ok(None)
        }
        Err(EvaluationError::Unexpected(e)) => Err(Error::UnexpectedEvaluation(e)),
    }
}
