/// Errors returned by the optimizer.
///
/// Recoverable evaluation failures never show up here: they are reported by
/// evaluators as [`EvaluationError::Failed`] and absorbed by the scheduler.
/// Every variant of this enum is fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds for '{name}': low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The variable name.
        name: String,
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when a vector's length does not match the variable topology.
    #[error("dimension mismatch: expected {expected} values but got {got}")]
    DimensionMismatch {
        /// The expected length.
        expected: usize,
        /// The actual length.
        got: usize,
    },

    /// Returned when a parameter or bound is NaN or infinite.
    #[error("non-finite value {value} for '{name}'")]
    NonFinite {
        /// What the value belongs to.
        name: String,
        /// The offending value.
        value: f64,
    },

    /// Returned when a coefficient lies outside `[0, 1]`.
    #[error("'{name}' must lie in [0, 1], got {value}")]
    OutOfUnitRange {
        /// The setting.
        name: String,
        /// The offending value.
        value: f64,
    },

    /// Returned when the population size is zero.
    #[error("population size must be greater than zero")]
    InvalidPopulationSize,

    /// Returned when the maximum generation count is zero.
    #[error("maximum generation count must be at least 1")]
    InvalidMaxGenerations,

    /// Returned when the requested concurrency is outside `1..=8`.
    #[error("concurrency must be in 1..=8, got {0}")]
    InvalidConcurrency(usize),

    /// Returned when a problem declares no targets.
    #[error("at least one target is required")]
    EmptyTargets,

    /// Returned when a constraint bound is zero (violations are normalized by it).
    #[error("constraint '{0}' has a zero bound")]
    InvalidConstraintBound(String),

    /// Returned when a name appears twice among variables, targets or constraints.
    #[error("duplicate name '{0}'")]
    DuplicateName(String),

    /// Returned when a string does not name a known enum variant.
    #[error("unknown {kind} '{value}'")]
    UnknownVariant {
        /// The enum being parsed (e.g. "direction", "initializer").
        kind: &'static str,
        /// The unrecognized input.
        value: String,
    },

    /// Returned when a study is built without an evaluator.
    #[error("an evaluator is required to run a study")]
    MissingEvaluator,

    /// Returned when a supplied workspace does not match the configured concurrency.
    #[error("workspace has {got} evaluation contexts but concurrency is {expected}")]
    ContextCount {
        /// The configured concurrency.
        expected: usize,
        /// The number of contexts in the workspace.
        got: usize,
    },

    /// Returned when an evaluator result lacks a configured target or constraint.
    #[error("evaluator output is missing '{0}'")]
    MissingOutput(String),

    /// Returned when an evaluator fails in a way that cannot be retried.
    #[error("unexpected evaluation error: {0}")]
    UnexpectedEvaluation(#[source] Box<dyn core::error::Error + Send + Sync>),

    /// Returned when offspring are requested from an empty archive.
    #[error("cannot draw parents: the archive is empty")]
    ExhaustedPool,

    /// Returned when an evaluation worker task panics or the pool shuts down.
    #[error("evaluation task error: {0}")]
    TaskError(String),

    /// Returned when an evaluation directory cannot be provisioned or removed.
    #[error("workspace error at '{}': {source}", path.display())]
    Workspace {
        /// The directory or file being processed.
        path: std::path::PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Returned when reading or writing persisted generations fails.
    #[error("storage error: {0}")]
    Storage(String),

    /// Returned when an internal invariant is violated.
    #[error("internal error: {0}")]
    Internal(&'static str),

    /// A fatal error that terminated a run, tagged with the generation index.
    #[error("run aborted at generation {generation}: {source}")]
    RunAborted {
        /// The generation being processed when the error occurred.
        generation: usize,
        /// The underlying error.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap `self` with the generation index it occurred at.
    ///
    /// Errors that already carry a generation index are returned unchanged.
    #[must_use]
    pub fn at_generation(self, generation: usize) -> Self {
        match self {
            e @ Error::RunAborted { .. } => e,
            e => Error::RunAborted {
                generation,
                source: Box::new(e),
            },
        }
    }

    /// Return the innermost error, looking through [`Error::RunAborted`].
    #[must_use]
    pub fn root(&self) -> &Error {
        match self {
            Error::RunAborted { source, .. } => source.root(),
            e => e,
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

/// The outcome of a failed call to an [`Evaluator`](crate::Evaluator).
///
/// `Failed` means the evaluator ran but could not produce a usable
/// measurement (malformed or non-convergent output). The scheduler replaces
/// the individual and tries again. `Unexpected` is anything else and aborts
/// the run.
///
/// # Examples
///
/// ```
/// use spea2::EvaluationError;
///
/// fn parse_gain(raw: &str) -> Result<f64, EvaluationError> {
///     raw.trim()
///         .parse()
///         .map_err(|_| EvaluationError::failed(format!("cannot parse gain from {raw:?}")))
/// }
///
/// assert!(parse_gain("12.5").is_ok());
/// assert!(parse_gain("failed").unwrap_err().is_recoverable());
/// ```
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// The evaluation did not converge or produced malformed output.
    #[error("evaluation failed: {0}")]
    Failed(String),

    /// Any other error; fatal.
    #[error("unexpected evaluation error: {0}")]
    Unexpected(#[source] Box<dyn core::error::Error + Send + Sync>),
}

impl EvaluationError {
    /// Shorthand for [`EvaluationError::Failed`].
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        EvaluationError::Failed(reason.into())
    }

    /// Returns `true` if the scheduler may retry with a replacement individual.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EvaluationError::Failed(_))
    }
}

impl From<std::io::Error> for EvaluationError {
    fn from(e: std::io::Error) -> Self {
        EvaluationError::Unexpected(Box::new(e))
    }
}
