//! The design space being searched.
//!
//! A [`Problem`] is built once per run and shared read-only (behind an
//! `Arc`) with every component that needs bounds or output names: the
//! fitness engine, the variation operators, and the scheduler.
//!
//! ```
//! use spea2::Problem;
//!
//! let problem = Problem::builder()
//!     .variable("w1", 1e-6, 1e-4)
//!     .variable("l1", 1e-7, 1e-6)
//!     .maximize("gain")
//!     .minimize("power")
//!     .max_constraint("area", 2e-9)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(problem.n_variables(), 2);
//! assert_eq!(problem.targets().len(), 2);
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parameter::ParameterVector;
use crate::types::{ConstraintKind, Direction};

/// A named design variable with inclusive bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Name used when the parameter is written for the evaluator.
    pub name: String,
    /// Inclusive lower bound.
    pub lower: f64,
    /// Inclusive upper bound.
    pub upper: f64,
}

/// A named measurement to maximize or minimize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Output name reported by the evaluator.
    pub name: String,
    /// Optimization direction.
    pub direction: Direction,
}

/// A named measurement that must stay on one side of a bound.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Output name reported by the evaluator.
    pub name: String,
    /// Which side of the bound is feasible.
    pub kind: ConstraintKind,
    /// The bound; must be non-zero.
    pub bound: f64,
}

/// Immutable description of variables, targets and constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProblemSpec", into = "ProblemSpec")]
pub struct Problem {
    variables: Vec<Variable>,
    targets: Vec<Target>,
    constraints: Vec<Constraint>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Problem {
    /// Start building a problem.
    #[must_use]
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::default()
    }

    /// Number of design variables.
    #[must_use]
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// The design variables, in vector order.
    #[must_use]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The targets, in measurement order.
    #[must_use]
    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// The constraints, in measurement order.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Per-variable lower bounds.
    #[must_use]
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    /// Per-variable upper bounds.
    #[must_use]
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    /// Names of every output the evaluator must report: targets then constraints.
    pub fn output_names(&self) -> impl Iterator<Item = &str> {
        self.targets
            .iter()
            .map(|t| t.name.as_str())
            .chain(self.constraints.iter().map(|c| c.name.as_str()))
    }

    /// Validate raw values against the topology and wrap them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if the length differs from the
    /// number of variables, or [`Error::NonFinite`] for NaN/infinite values.
    pub fn parameters(&self, values: Vec<f64>) -> Result<ParameterVector> {
        if values.len() != self.n_variables() {
            return Err(Error::DimensionMismatch {
                expected: self.n_variables(),
                got: values.len(),
            });
        }
        ParameterVector::new(values)
    }

    /// Returns `true` if every value lies within its variable's bounds.
    #[must_use]
    pub fn contains(&self, params: &ParameterVector) -> bool {
        params.len() == self.n_variables()
            && params
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(&v, (&lo, &hi))| lo <= v && v <= hi)
    }
}

/// Fluent builder for [`Problem`].
#[derive(Clone, Debug, Default)]
pub struct ProblemBuilder {
    variables: Vec<Variable>,
    targets: Vec<Target>,
    constraints: Vec<Constraint>,
}

impl ProblemBuilder {
    /// Add a design variable with inclusive bounds.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, lower: f64, upper: f64) -> Self {
        self.variables.push(Variable {
            name: name.into(),
            lower,
            upper,
        });
        self
    }

    /// Add a target with an explicit direction.
    #[must_use]
    pub fn target(mut self, name: impl Into<String>, direction: Direction) -> Self {
        self.targets.push(Target {
            name: name.into(),
            direction,
        });
        self
    }

    /// Add a target to maximize.
    #[must_use]
    pub fn maximize(self, name: impl Into<String>) -> Self {
        self.target(name, Direction::Maximize)
    }

    /// Add a target to minimize.
    #[must_use]
    pub fn minimize(self, name: impl Into<String>) -> Self {
        self.target(name, Direction::Minimize)
    }

    /// Add a constraint with an explicit kind.
    #[must_use]
    pub fn constraint(mut self, name: impl Into<String>, kind: ConstraintKind, bound: f64) -> Self {
        self.constraints.push(Constraint {
            name: name.into(),
            kind,
            bound,
        });
        self
    }

    /// Add a constraint `value <= bound`.
    #[must_use]
    pub fn max_constraint(self, name: impl Into<String>, bound: f64) -> Self {
        self.constraint(name, ConstraintKind::Max, bound)
    }

    /// Add a constraint `value >= bound`.
    #[must_use]
    pub fn min_constraint(self, name: impl Into<String>, bound: f64) -> Self {
        self.constraint(name, ConstraintKind::Min, bound)
    }

    /// Validate and build the problem.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if there are no variables or targets,
    /// a bound is not finite or inverted, a constraint bound is zero, or a
    /// name is used twice.
    pub fn build(self) -> Result<Problem> {
        if self.variables.is_empty() {
            return Err(Error::DimensionMismatch {
                expected: 1,
                got: 0,
            });
        }
        if self.targets.is_empty() {
            return Err(Error::EmptyTargets);
        }

        let mut seen = HashSet::new();
        let names = self
            .variables
            .iter()
            .map(|v| &v.name)
            .chain(self.targets.iter().map(|t| &t.name))
            .chain(self.constraints.iter().map(|c| &c.name));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(Error::DuplicateName(name.clone()));
            }
        }

        for v in &self.variables {
            for value in [v.lower, v.upper] {
                if !value.is_finite() {
                    return Err(Error::NonFinite {
                        name: v.name.clone(),
                        value,
                    });
                }
            }
            if v.lower > v.upper {
                return Err(Error::InvalidBounds {
                    name: v.name.clone(),
                    low: v.lower,
                    high: v.upper,
                });
            }
        }

        for c in &self.constraints {
            if !c.bound.is_finite() {
                return Err(Error::NonFinite {
                    name: c.name.clone(),
                    value: c.bound,
                });
            }
            if c.bound == 0.0 {
                return Err(Error::InvalidConstraintBound(c.name.clone()));
            }
        }

        let lower = self.variables.iter().map(|v| v.lower).collect();
        let upper = self.variables.iter().map(|v| v.upper).collect();
        Ok(Problem {
            variables: self.variables,
            targets: self.targets,
            constraints: self.constraints,
            lower,
            upper,
        })
    }
}

/// Serialized form of a [`Problem`]; validated on deserialization.
#[derive(Serialize, Deserialize)]
struct ProblemSpec {
    variables: Vec<Variable>,
    targets: Vec<Target>,
    #[serde(default)]
    constraints: Vec<Constraint>,
}

impl TryFrom<ProblemSpec> for Problem {
    type Error = Error;

    fn try_from(spec: ProblemSpec) -> Result<Self> {
        ProblemBuilder {
            variables: spec.variables,
            targets: spec.targets,
            constraints: spec.constraints,
        }
        .build()
    }
}

impl From<Problem> for ProblemSpec {
    fn from(p: Problem) -> Self {
        Self {
            variables: p.variables,
            targets: p.targets,
            constraints: p.constraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_inverted_bounds() {
        let err = Problem::builder()
            .variable("x", 1.0, 0.0)
            .maximize("y")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBounds { .. }));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let err = Problem::builder()
            .variable("x", 0.0, 1.0)
            .maximize("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName(name) if name == "x"));
    }

    #[test]
    fn test_rejects_zero_constraint_bound() {
        let err = Problem::builder()
            .variable("x", 0.0, 1.0)
            .maximize("y")
            .max_constraint("z", 0.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConstraintBound(_)));
    }

    #[test]
    fn test_parameters_checks_length() {
        let problem = Problem::builder()
            .variable("a", 0.0, 1.0)
            .variable("b", 0.0, 1.0)
            .maximize("y")
            .build()
            .unwrap();
        assert!(matches!(
            problem.parameters(vec![0.5]),
            Err(Error::DimensionMismatch {
                expected: 2,
                got: 1
            })
        ));
        let p = problem.parameters(vec![0.5, 0.25]).unwrap();
        assert!(problem.contains(&p));
        assert!(!problem.contains(&p.with_value(0, 1.5)));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{
            "variables": [{"name": "x", "lower": 0.0, "upper": 1.0}],
            "targets": [{"name": "gain", "direction": "max"}],
            "constraints": [{"name": "area", "kind": "max", "bound": 2.0}]
        }"#;
        let problem: Problem = serde_json::from_str(json).unwrap();
        assert_eq!(problem.output_names().collect::<Vec<_>>(), ["gain", "area"]);

        let bad = r#"{"variables": [], "targets": [{"name": "g", "direction": "max"}]}"#;
        assert!(serde_json::from_str::<Problem>(bad).is_err());
    }
}
