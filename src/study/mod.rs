//! The optimization driver.
//!
//! A [`Study`] ties a [`Problem`], an [`Evaluator`](crate::Evaluator) and a
//! [`Spea2Config`] together and runs the SPEA2 cycle:
//!
//! 1. evaluate generation 0, score it on its own, archive := population
//! 2. repeat: breed from the archive, evaluate (breeding replacements for
//!    failed slots), score jointly with the previous archive, select the new
//!    archive, store the finished generation
//!
//! Fatal errors abort the run and are returned as
//! [`Error::RunAborted`](crate::Error::RunAborted) carrying the generation
//! index.

mod builder;

use core::ops::ControlFlow;
use std::sync::Arc;

pub use builder::StudyBuilder;

use crate::config::Spea2Config;
use crate::error::Result;
use crate::fitness::{assign_first, assign_joint};
use crate::generation::Generation;
use crate::individual::Individual;
use crate::observer::Observer;
use crate::problem::Problem;
use crate::scheduler::{RandomReplacement, Scheduler};
use crate::selection::select_archive;
#[cfg(feature = "journal")]
use crate::storage::GenerationJournal;
use crate::storage::GenerationPool;
use crate::types::Provenance;
use crate::variation::{Offspring, initial_population, produce};
use crate::workspace::Workspace;

/// A configured SPEA2 optimization, ready to [`run`](Self::run).
pub struct Study {
    problem: Arc<Problem>,
    config: Spea2Config,
    scheduler: Scheduler,
    workspace: Workspace,
    keep_workspace: bool,
    observer: Option<Box<dyn Observer>>,
    #[cfg(feature = "journal")]
    journal: Option<GenerationJournal>,
}

impl core::fmt::Debug for Study {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Study")
            .field("problem", &self.problem)
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl Study {
    /// Start building a study over `problem`.
    #[must_use]
    pub fn builder(problem: Problem) -> StudyBuilder {
        StudyBuilder::new(problem)
    }

    /// The design space.
    #[must_use]
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// The algorithm settings.
    #[must_use]
    pub fn config(&self) -> &Spea2Config {
        &self.config
    }

    /// The evaluation contexts.
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run all generations and return the stored results.
    ///
    /// The run ends after `max_generations` generations or when the observer
    /// breaks. Provisioned directories are refreshed from the template
    /// first, so a study can be run repeatedly. Unless
    /// [`keep_workspace`](StudyBuilder::keep_workspace) was set, they are
    /// removed afterwards, also on error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RunAborted`](crate::Error::RunAborted) wrapping the
    /// first fatal error, or a workspace error if teardown fails.
    pub fn run(&self) -> Result<GenerationPool> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "run",
            population = self.config.population_size,
            generations = self.config.max_generations,
            concurrency = self.config.concurrency
        )
        .entered();

        let result = self
            .workspace
            .refresh()
            .and_then(|()| self.run_generations());
        if self.keep_workspace {
            return result;
        }
        let cleanup = self.workspace.teardown();
        match (result, cleanup) {
            (Ok(_), Err(e)) => Err(e),
            (result, _) => result,
        }
    }

    fn run_generations(&self) -> Result<GenerationPool> {
        let mut rng = self
            .config
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let mut pool = GenerationPool::new(
            self.config.storage,
            &self.problem,
            self.config.max_generations,
        );

        let mut current = self
            .first_generation(&mut rng)
            .map_err(|e| e.at_generation(0))?;
        if self.finish(&mut pool, &current).map_err(|e| e.at_generation(0))?
            == ControlFlow::Break(())
        {
            return Ok(pool);
        }

        for index in 1..self.config.max_generations {
            current = self
                .next_generation(&current.archive, index, &mut rng)
                .map_err(|e| e.at_generation(index))?;
            if self
                .finish(&mut pool, &current)
                .map_err(|e| e.at_generation(index))?
                == ControlFlow::Break(())
            {
                trace_info!(generation = index, "run stopped by observer");
                break;
            }
        }
        Ok(pool)
    }

    fn first_generation(&self, rng: &mut fastrand::Rng) -> Result<Generation> {
        trace_debug!(generation = 0, "generation started");
        let n = self.config.population_size;
        let individuals = initial_population(&self.problem, &self.config.initializer, n, rng)?;
        let mut generation = Generation::new(0, individuals);

        let mut replacer = RandomReplacement::new(&self.problem, rng.fork());
        let report = self
            .scheduler
            .evaluate(&mut generation.individuals, &mut replacer)?;
        if let Some(observer) = &self.observer {
            observer.after_evaluation(0, &report);
        }

        assign_first(&self.problem, &mut generation.individuals, 0);
        generation.archive = generation
            .individuals
            .iter()
            .map(|ind| {
                let mut member = ind.clone();
                member.provenance = Provenance::FromGeneration;
                member
            })
            .collect();
        Ok(generation)
    }

    fn next_generation(
        &self,
        previous_archive: &[Individual],
        index: usize,
        rng: &mut fastrand::Rng,
    ) -> Result<Generation> {
        trace_debug!(generation = index, "generation started");
        let n = self.config.population_size;
        let variation = self.config.variation;
        let mut generation = produce(&self.problem, variation, previous_archive, n, index, rng)?;

        let mut replacer = Offspring::new(&self.problem, variation, previous_archive, rng);
        let report = self
            .scheduler
            .evaluate(&mut generation.individuals, &mut replacer)?;
        if let Some(observer) = &self.observer {
            observer.after_evaluation(index, &report);
        }

        // Re-score a copy so the stored archive of the previous generation
        // keeps the fitness it was ranked with.
        let mut archive = previous_archive.to_vec();
        assign_joint(&self.problem, &mut generation.individuals, &mut archive, index);
        generation.archive = select_archive(
            &self.problem,
            &generation.individuals,
            &archive,
            n,
            self.config.truncation,
        );
        Ok(generation)
    }

    /// Store a finished generation and ask the observer whether to go on.
    fn finish(&self, pool: &mut GenerationPool, generation: &Generation) -> Result<ControlFlow<()>> {
        pool.append(generation)?;
        #[cfg(feature = "journal")]
        if let Some(journal) = &self.journal {
            journal.append(generation)?;
        }
        trace_info!(
            generation = generation.index,
            archive = generation.archive.len(),
            elite = generation.archive.iter().filter(|i| i.effective_fitness().is_elite()).count(),
            "generation finished"
        );
        Ok(self
            .observer
            .as_ref()
            .map_or(ControlFlow::Continue(()), |o| o.after_generation(generation)))
    }
}
