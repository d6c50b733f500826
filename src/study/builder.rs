use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Spea2Config;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::observer::Observer;
use crate::problem::Problem;
use crate::scheduler::Scheduler;
#[cfg(feature = "journal")]
use crate::storage::GenerationJournal;
use crate::workspace::Workspace;

use super::Study;

/// A builder for constructing [`Study`] instances with a fluent API.
///
/// Created via [`Study::builder()`]. An evaluator is required; everything
/// else has a default.
///
/// # Defaults
///
/// - Config: [`Spea2Config::default()`]
/// - Workspace: [`Workspace::detached`] with the configured concurrency,
///   or a provisioned copy of [`template`](Self::template) if given
/// - Observer: none
///
/// # Examples
///
/// ```
/// use std::path::Path;
///
/// use spea2::prelude::*;
///
/// let problem = Problem::builder()
///     .variable("x", 0.0, 1.0)
///     .maximize("y")
///     .build()
///     .unwrap();
///
/// let study = Study::builder(problem)
///     .config(Spea2Config { population_size: 6, max_generations: 3, ..Spea2Config::default() })
///     .evaluator(|p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
///         Ok(Outputs::from([("y".to_owned(), p[0])]))
///     })
///     .build()
///     .unwrap();
///
/// let pool = study.run().unwrap();
/// assert_eq!(pool.len(), 3);
/// ```
pub struct StudyBuilder {
    problem: Problem,
    config: Spea2Config,
    evaluator: Option<Arc<dyn Evaluator>>,
    workspace: Option<Workspace>,
    template: Option<PathBuf>,
    keep_workspace: bool,
    observer: Option<Box<dyn Observer>>,
    #[cfg(feature = "journal")]
    journal: Option<GenerationJournal>,
}

impl StudyBuilder {
    pub(super) fn new(problem: Problem) -> Self {
        Self {
            problem,
            config: Spea2Config::default(),
            evaluator: None,
            workspace: None,
            template: None,
            keep_workspace: false,
            observer: None,
            #[cfg(feature = "journal")]
            journal: None,
        }
    }

    /// Set the algorithm settings.
    #[must_use]
    pub fn config(mut self, config: Spea2Config) -> Self {
        self.config = config;
        self
    }

    /// Set the evaluator measuring each design.
    #[must_use]
    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    /// Use an already provisioned workspace. Its context count must equal
    /// the configured concurrency.
    #[must_use]
    pub fn workspace(mut self, workspace: Workspace) -> Self {
        self.workspace = Some(workspace);
        self
    }

    /// Provision a workspace from `template` when building.
    #[must_use]
    pub fn template(mut self, template: impl Into<PathBuf>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Leave the provisioned copies on disk after [`Study::run`].
    #[must_use]
    pub fn keep_workspace(mut self) -> Self {
        self.keep_workspace = true;
        self
    }

    /// Set the lifecycle observer.
    #[must_use]
    pub fn observer(mut self, observer: impl Observer + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Append every finished generation to a JSONL journal.
    #[cfg(feature = "journal")]
    #[must_use]
    pub fn journal(mut self, path: impl AsRef<std::path::Path>) -> Self {
        self.journal = Some(GenerationJournal::new(path));
        self
    }

    /// Validate the settings and build the [`Study`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid settings,
    /// [`Error::MissingEvaluator`] without an evaluator,
    /// [`Error::ContextCount`] if a supplied workspace does not match the
    /// concurrency, and [`Error::Workspace`] if provisioning fails.
    pub fn build(self) -> Result<Study> {
        self.config.validate(&self.problem)?;
        let evaluator = self.evaluator.ok_or(Error::MissingEvaluator)?;
        let concurrency = self.config.concurrency;

        let workspace = match (self.workspace, self.template) {
            (Some(workspace), _) => {
                if workspace.len() != concurrency {
                    return Err(Error::ContextCount {
                        expected: concurrency,
                        got: workspace.len(),
                    });
                }
                workspace
            }
            (None, Some(template)) => Workspace::provision(template, concurrency)?,
            (None, None) => Workspace::detached(concurrency)?,
        };

        let problem = Arc::new(self.problem);
        let scheduler = Scheduler::new(
            Arc::clone(&problem),
            evaluator,
            &workspace,
            self.config.max_retries,
        )?;

        Ok(Study {
            problem,
            config: self.config,
            scheduler,
            workspace,
            keep_workspace: self.keep_workspace,
            observer: self.observer,
            #[cfg(feature = "journal")]
            journal: self.journal,
        })
    }
}
