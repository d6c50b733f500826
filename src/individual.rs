//! Candidate solutions and their fitness bookkeeping.

use core::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::parameter::ParameterVector;
use crate::types::{EvaluationStatus, Provenance};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Ordered target and constraint values measured for one individual.
///
/// `targets[i]` corresponds to `problem.targets()[i]` and holds the raw
/// (not direction-mapped) value; likewise for `constraints`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    /// Raw target values.
    pub targets: Vec<f64>,
    /// Raw constraint values.
    pub constraints: Vec<f64>,
}

/// SPEA2 fitness components of one individual. Lower `fitness` is better.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FitnessRecord {
    /// Number of individuals this one dominates.
    pub strength: usize,
    /// Aggregate dominance pressure; 0 means non-dominated.
    pub raw_fitness: usize,
    /// Nearest-neighbour density estimate in normalized target space.
    #[serde(with = "extended_f64")]
    pub distance: f64,
    /// Normalized constraint violation; 0 means feasible.
    #[serde(with = "extended_f64")]
    pub total_error: f64,
    /// Scalar fitness combining the components above.
    #[serde(with = "extended_f64")]
    pub fitness: f64,
}

/// JSON has no infinities: non-finite values travel as `"inf"`, `"-inf"` or
/// `"nan"`.
mod extended_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Tag(String),
    }

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_infinite() {
            serializer.serialize_str(if *value > 0.0 { "inf" } else { "-inf" })
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Tag(tag) => match tag.as_str() {
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => Err(serde::de::Error::custom(format!(
                    "expected a number, \"inf\", \"-inf\" or \"nan\", got {other:?}"
                ))),
            },
        }
    }
}

impl FitnessRecord {
    /// Record assigned to individuals whose evaluation never succeeded.
    ///
    /// Ranks after every evaluated individual and is never feasible.
    #[must_use]
    pub fn failed() -> Self {
        Self {
            strength: 0,
            raw_fitness: 0,
            distance: 0.0,
            total_error: f64::INFINITY,
            fitness: f64::INFINITY,
        }
    }

    /// Returns `true` for feasible, non-dominated records.
    #[must_use]
    pub fn is_elite(&self) -> bool {
        self.raw_fitness == 0 && self.total_error == 0.0
    }
}

/// One candidate parameter vector with its measurements and fitness.
///
/// Each individual gets a process-unique `id` at construction; containers
/// key on it. Two individuals with identical parameters still have distinct
/// ids; environmental selection compares parameters explicitly where exact
/// duplicates matter.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Individual {
    id: u64,
    params: ParameterVector,
    /// Measurements, present once evaluation succeeded.
    pub measurements: Option<Measurements>,
    /// Evaluation state.
    pub status: EvaluationStatus,
    /// Primary fitness record.
    pub fitness: FitnessRecord,
    /// Fitness computed while this individual sat in the archive and was
    /// re-scored against a new generation.
    pub archive_fitness: FitnessRecord,
    /// Which fitness record is authoritative once in an archive.
    pub provenance: Provenance,
}

impl Individual {
    /// Wrap a parameter vector in a fresh, unevaluated individual.
    #[must_use]
    pub fn new(params: ParameterVector) -> Self {
        Self::with_id(NEXT_ID.fetch_add(1, Ordering::Relaxed), params)
    }

    /// Process-unique identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The parameter vector.
    #[must_use]
    pub fn params(&self) -> &ParameterVector {
        &self.params
    }

    /// Returns `true` if evaluation succeeded.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.status == EvaluationStatus::Evaluated && self.measurements.is_some()
    }

    /// The fitness record that counts for this individual given its provenance.
    #[must_use]
    pub fn effective_fitness(&self) -> &FitnessRecord {
        match self.provenance {
            Provenance::FromArchive => &self.archive_fitness,
            Provenance::FromGeneration | Provenance::Unset => &self.fitness,
        }
    }

    /// Record a successful evaluation.
    pub(crate) fn set_evaluated(&mut self, measurements: Measurements) {
        self.measurements = Some(measurements);
        self.status = EvaluationStatus::Evaluated;
    }

    /// This individual reduced to its id and parameters.
    #[must_use]
    pub(crate) fn pruned(&self) -> Self {
        Self::with_id(self.id, self.params.clone())
    }

    fn with_id(id: u64, params: ParameterVector) -> Self {
        Self {
            id,
            params,
            measurements: None,
            status: EvaluationStatus::NotEvaluated,
            fitness: FitnessRecord::default(),
            archive_fitness: FitnessRecord::default(),
            provenance: Provenance::Unset,
        }
    }

    /// Copy of this individual under a new id.
    ///
    /// Used when the archive must hold more slots than there are distinct
    /// candidates.
    #[must_use]
    pub(crate) fn duplicate(&self) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            ..self.clone()
        }
    }
}
