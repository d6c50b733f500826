//! Fault-tolerant evaluation of a generation.
//!
//! The [`Scheduler`] evaluates every individual of a generation through an
//! [`Evaluator`]. A recoverable failure marks the slot `Failed`, swaps in a
//! fresh individual from a [`Replacement`] source and evaluates it again, so
//! a generation keeps its size however many evaluations fail.
//!
//! With a concurrency of 1 individuals are evaluated strictly in order, each
//! slot retried until it succeeds before the next one starts. Above 1,
//! evaluation proceeds in rounds on a tokio runtime owned by the scheduler:
//! all pending slots are submitted as blocking tasks, the round waits for
//! every task, then only the failed slots are replaced and resubmitted.
//!
//! Each task holds its context's lock for the whole evaluation, so two
//! evaluations cycled onto the same directory never overlap.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::evaluator::{Evaluator, measure};
use crate::individual::{FitnessRecord, Individual, Measurements};
use crate::problem::Problem;
use crate::types::EvaluationStatus;
use crate::variation::random_parameters;
use crate::workspace::{EvaluationContext, Workspace};

// ---------------------------------------------------------------------------
// Replacement sources
// ---------------------------------------------------------------------------

/// Supplies a new individual for a slot whose evaluation failed.
pub trait Replacement {
    /// Produce the next replacement.
    ///
    /// # Errors
    ///
    /// Implementations may fail, e.g. when breeding from an empty archive.
    fn replacement(&mut self) -> Result<Individual>;
}

/// Replaces failed slots with uniformly random individuals.
///
/// Used for generation 0, before any archive exists.
pub struct RandomReplacement<'a> {
    problem: &'a Problem,
    rng: fastrand::Rng,
}

impl<'a> RandomReplacement<'a> {
    /// Create a source drawing from `rng`.
    #[must_use]
    pub fn new(problem: &'a Problem, rng: fastrand::Rng) -> Self {
        Self { problem, rng }
    }
}

impl Replacement for RandomReplacement<'_> {
    fn replacement(&mut self) -> Result<Individual> {
        Ok(Individual::new(random_parameters(self.problem, &mut self.rng)))
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// What happened while evaluating one generation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Evaluation passes. Equals one plus the largest number of replacements
    /// any single slot needed.
    pub rounds: usize,
    /// Total replacements made.
    pub replacements: usize,
    /// Slots that hit the retry ceiling and remain `Failed`, ascending.
    pub exhausted: Vec<usize>,
}

impl EvaluationReport {
    /// Returns `true` if every slot ended `Evaluated`.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.exhausted.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Drives evaluations over a fixed set of isolated contexts.
pub struct Scheduler {
    problem: Arc<Problem>,
    evaluator: Arc<dyn Evaluator>,
    contexts: Arc<[EvaluationContext]>,
    concurrency: usize,
    max_retries: Option<usize>,
    runtime: Option<tokio::runtime::Runtime>,
}

impl core::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scheduler")
            .field("concurrency", &self.concurrency)
            .field("contexts", &self.contexts.len())
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler running up to `workspace.len()` evaluations at once.
    ///
    /// `max_retries` caps replacements per slot per call; `None` retries
    /// until the slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TaskError`] if the worker runtime cannot be started.
    pub fn new(
        problem: Arc<Problem>,
        evaluator: Arc<dyn Evaluator>,
        workspace: &Workspace,
        max_retries: Option<usize>,
    ) -> Result<Self> {
        let concurrency = workspace.len();
        if concurrency == 0 {
            return Err(Error::InvalidConcurrency(0));
        }
        let runtime = if concurrency > 1 {
            Some(
                tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(concurrency)
                    .max_blocking_threads(concurrency)
                    .thread_name("spea2-eval")
                    .build()
                    .map_err(|e| Error::TaskError(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self {
            problem,
            evaluator,
            contexts: workspace.shared_contexts(),
            concurrency,
            max_retries,
            runtime,
        })
    }

    /// Maximum number of evaluations in flight.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Evaluate every individual not yet `Evaluated`.
    ///
    /// On return each slot is `Evaluated`, or `Failed` and listed in
    /// [`EvaluationReport::exhausted`] if the retry ceiling was hit.
    /// Exhausted slots get [`FitnessRecord::failed`].
    ///
    /// Must not be called from within an async context when concurrency is
    /// above 1: the scheduler blocks on its own runtime.
    ///
    /// # Errors
    ///
    /// Returns the first fatal evaluator error ([`Error::UnexpectedEvaluation`],
    /// [`Error::MissingOutput`]), any error from `replacer`, or
    /// [`Error::TaskError`] if a worker panics.
    pub fn evaluate(
        &self,
        individuals: &mut [Individual],
        replacer: &mut dyn Replacement,
    ) -> Result<EvaluationReport> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "evaluate",
            n = individuals.len(),
            concurrency = self.concurrency
        )
        .entered();

        let pending: Vec<usize> = (0..individuals.len())
            .filter(|&i| !individuals[i].is_evaluated())
            .collect();

        let report = match &self.runtime {
            Some(runtime) => self.evaluate_rounds(runtime, individuals, pending, replacer)?,
            None => self.evaluate_serial(individuals, &pending, replacer)?,
        };

        trace_info!(
            rounds = report.rounds,
            replacements = report.replacements,
            exhausted = report.exhausted.len(),
            "generation evaluated"
        );
        Ok(report)
    }

    /// Whether `slot` may be replaced once more; marks it exhausted if not.
    fn try_replace(
        &self,
        individuals: &mut [Individual],
        slot: usize,
        retries: &mut usize,
        report: &mut EvaluationReport,
        replacer: &mut dyn Replacement,
    ) -> Result<bool> {
        if self.max_retries.is_some_and(|max| *retries >= max) {
            individuals[slot].fitness = FitnessRecord::failed();
            report.exhausted.push(slot);
            trace_debug!(slot, retries = *retries, "slot exhausted its retries");
            return Ok(false);
        }
        individuals[slot] = replacer.replacement()?;
        *retries += 1;
        report.replacements += 1;
        trace_debug!(slot, retry = *retries, "failed slot replaced");
        Ok(true)
    }

    fn evaluate_serial(
        &self,
        individuals: &mut [Individual],
        pending: &[usize],
        replacer: &mut dyn Replacement,
    ) -> Result<EvaluationReport> {
        let mut report = EvaluationReport::default();
        let context = &self.contexts[0];

        for &slot in pending {
            let mut retries = 0;
            loop {
                let outcome = {
                    let _guard = context.acquire();
                    measure(
                        self.evaluator.as_ref(),
                        &self.problem,
                        individuals[slot].params(),
                        context.dir(),
                    )?
                };
                if let Some(m) = outcome {
                    individuals[slot].set_evaluated(m);
                    break;
                }
                individuals[slot].status = EvaluationStatus::Failed;
                if !self.try_replace(individuals, slot, &mut retries, &mut report, replacer)? {
                    break;
                }
            }
            report.rounds = report.rounds.max(retries + 1);
        }
        Ok(report)
    }

    fn evaluate_rounds(
        &self,
        runtime: &tokio::runtime::Runtime,
        individuals: &mut [Individual],
        mut pending: Vec<usize>,
        replacer: &mut dyn Replacement,
    ) -> Result<EvaluationReport> {
        let mut report = EvaluationReport::default();
        let mut retries = vec![0_usize; individuals.len()];

        while !pending.is_empty() {
            report.rounds += 1;
            trace_debug!(round = report.rounds, pending = pending.len(), "round started");
            let outcomes = runtime.block_on(self.round(individuals, &pending))?;

            let mut failed = Vec::new();
            for (slot, outcome) in outcomes {
                match outcome {
                    Some(m) => individuals[slot].set_evaluated(m),
                    None => {
                        individuals[slot].status = EvaluationStatus::Failed;
                        failed.push(slot);
                    }
                }
            }
            failed.sort_unstable();
            trace_debug!(round = report.rounds, failed = failed.len(), "round finished");

            pending.clear();
            for slot in failed {
                if self.try_replace(individuals, slot, &mut retries[slot], &mut report, replacer)? {
                    pending.push(slot);
                }
            }
        }
        Ok(report)
    }

    /// Submit one round and wait for every task to finish.
    async fn round(
        &self,
        individuals: &[Individual],
        pending: &[usize],
    ) -> Result<Vec<(usize, Option<Measurements>)>> {
        use tokio::sync::Semaphore;
        use tokio::task::JoinSet;

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(usize, Result<Option<Measurements>>)> = JoinSet::new();

        for (position, &slot) in pending.iter().enumerate() {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::TaskError(e.to_string()))?;
            let context_index = position % self.contexts.len();
            let contexts = Arc::clone(&self.contexts);
            let evaluator = Arc::clone(&self.evaluator);
            let problem = Arc::clone(&self.problem);
            let params = individuals[slot].params().clone();

            join_set.spawn_blocking(move || {
                let context = &contexts[context_index];
                let outcome = {
                    let _guard = context.acquire();
                    measure(evaluator.as_ref(), &problem, &params, context.dir())
                };
                drop(permit);
                (slot, outcome)
            });
        }

        // Drain everything before reporting so no task outlives the round.
        let mut outcomes = Vec::with_capacity(pending.len());
        let mut fatal: Option<(usize, Error)> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((slot, Ok(outcome))) => outcomes.push((slot, outcome)),
                Ok((slot, Err(e))) => {
                    if fatal.as_ref().is_none_or(|(first, _)| slot < *first) {
                        fatal = Some((slot, e));
                    }
                }
                Err(e) => {
                    if fatal.is_none() {
                        fatal = Some((usize::MAX, Error::TaskError(e.to_string())));
                    }
                }
            }
        }
        match fatal {
            Some((_, e)) => Err(e),
            None => Ok(outcomes),
        }
    }
}
