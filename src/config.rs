//! Algorithm settings and configuration file loading.
//!
//! [`Spea2Config`] carries every knob of a run that is not part of the
//! design space itself. Defaults: blend
//! coefficient 0.8, mutation trigger step `0.1 + 0.2 * U(0, 1)`, unbounded
//! retries, density-based archive truncation.
//!
//! A whole run can be described in one JSON document:
//!
//! ```
//! use spea2::config::RunConfig;
//!
//! let cfg = RunConfig::from_json_str(r#"{
//!     "problem": {
//!         "variables": [{"name": "w", "lower": 1.0, "upper": 10.0}],
//!         "targets": [{"name": "gain", "direction": "max"}],
//!         "constraints": [{"name": "power", "kind": "max", "bound": 0.5}]
//!     },
//!     "spea2": {"population_size": 20, "max_generations": 50, "concurrency": 4}
//! }"#).unwrap();
//!
//! assert_eq!(cfg.spea2.population_size, 20);
//! assert_eq!(cfg.spea2.variation.alpha, 0.8);
//! ```

use core::str::FromStr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::problem::Problem;
use crate::storage::StorageMode;

/// Upper limit on concurrent evaluations (and provisioned contexts).
pub const MAX_CONCURRENCY: usize = 8;

/// How the first generation is populated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Initializer {
    /// Uniform random within bounds.
    #[default]
    Random,
    /// Scrambled Sobol low-discrepancy points within bounds.
    #[cfg(feature = "sobol")]
    QuasiMonteCarlo,
    /// Caller-supplied parameter vectors, one per individual.
    Explicit(Vec<Vec<f64>>),
}

impl FromStr for Initializer {
    type Err = Error;

    /// Parse a named initializer. `Explicit` cannot be named and is rejected.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Initializer::Random),
            #[cfg(feature = "sobol")]
            "quasimontecarlo" | "quasi_monte_carlo" | "sobol" => Ok(Initializer::QuasiMonteCarlo),
            _ => Err(Error::UnknownVariant {
                kind: "initializer",
                value: s.to_owned(),
            }),
        }
    }
}

/// Archive truncation applied when more than N candidates are feasible and
/// non-dominated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truncation {
    /// SPEA2 truncation: repeatedly drop the member closest to its nearest
    /// neighbour in normalized target space.
    #[default]
    Density,
    /// Drop the most recently inserted members without ranking. Cheaper, but
    /// crowded regions of the front survive.
    Arbitrary,
}

/// Crossover and mutation coefficients.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariationConfig {
    /// Blend weight of the first parent in the first child.
    pub alpha: f64,
    /// Fixed part of the per-child mutation trigger step.
    pub step_base: f64,
    /// Random part of the trigger step, scaled by `U(0, 1)`.
    pub step_spread: f64,
}

impl Default for VariationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.8,
            step_base: 0.1,
            step_spread: 0.2,
        }
    }
}

/// Settings of a SPEA2 run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spea2Config {
    /// Individuals per generation and archive size (N).
    pub population_size: usize,
    /// Number of generations to run, including generation 0.
    pub max_generations: usize,
    /// Concurrent evaluations, `1..=8`.
    pub concurrency: usize,
    /// Replacements allowed per slot before it is reported as exhausted.
    /// `None` retries forever.
    pub max_retries: Option<usize>,
    /// Archive truncation strategy.
    pub truncation: Truncation,
    /// First-generation initializer.
    pub initializer: Initializer,
    /// Crossover and mutation coefficients.
    pub variation: VariationConfig,
    /// Generation store layout.
    pub storage: StorageMode,
    /// Seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for Spea2Config {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_generations: 10,
            concurrency: 1,
            max_retries: None,
            truncation: Truncation::default(),
            initializer: Initializer::default(),
            variation: VariationConfig::default(),
            storage: StorageMode::default(),
            seed: None,
        }
    }
}

impl Spea2Config {
    /// Check value ranges and, for explicit initializers, vector shapes.
    ///
    /// # Errors
    ///
    /// Returns the configuration error describing the first invalid field.
    pub fn validate(&self, problem: &Problem) -> Result<()> {
        if self.population_size == 0 {
            return Err(Error::InvalidPopulationSize);
        }
        if self.max_generations == 0 {
            return Err(Error::InvalidMaxGenerations);
        }
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(Error::InvalidConcurrency(self.concurrency));
        }
        for (name, value) in [
            ("alpha", self.variation.alpha),
            ("step_base", self.variation.step_base),
            ("step_spread", self.variation.step_spread),
        ] {
            if !value.is_finite() {
                return Err(Error::NonFinite {
                    name: name.to_owned(),
                    value,
                });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::OutOfUnitRange {
                    name: name.to_owned(),
                    value,
                });
            }
        }
        // The drawn trigger step must stay a fraction of the range too.
        let widest = self.variation.step_base + self.variation.step_spread;
        if widest > 1.0 {
            return Err(Error::OutOfUnitRange {
                name: "step_base + step_spread".to_owned(),
                value: widest,
            });
        }
        if let Initializer::Explicit(vectors) = &self.initializer {
            if vectors.len() != self.population_size {
                return Err(Error::DimensionMismatch {
                    expected: self.population_size,
                    got: vectors.len(),
                });
            }
            for v in vectors {
                problem.parameters(v.clone())?;
            }
        }
        Ok(())
    }
}

/// A complete run description: design space plus algorithm settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// The design space.
    pub problem: Problem,
    /// Algorithm settings.
    #[serde(default)]
    pub spea2: Spea2Config,
}

impl RunConfig {
    /// Parse and validate a JSON run description.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] for malformed JSON (including invalid
    /// problems, whose validation error is embedded in the message) and the
    /// corresponding configuration error for out-of-range settings.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: RunConfig =
            serde_json::from_str(json).map_err(|e| Error::Storage(e.to_string()))?;
        cfg.spea2.validate(&cfg.problem)?;
        Ok(cfg)
    }

    /// Read and validate a JSON run description from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be read, plus anything
    /// [`from_json_str`](Self::from_json_str) returns.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Storage(e.to_string()))?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem() -> Problem {
        Problem::builder()
            .variable("x", 0.0, 1.0)
            .maximize("y")
            .build()
            .unwrap()
    }

    #[test]
    fn test_default_is_valid() {
        Spea2Config::default().validate(&problem()).unwrap();
    }

    #[test]
    fn test_rejects_bad_ranges() {
        let p = problem();
        let cfg = Spea2Config {
            population_size: 0,
            ..Spea2Config::default()
        };
        assert!(matches!(cfg.validate(&p), Err(Error::InvalidPopulationSize)));

        let cfg = Spea2Config {
            concurrency: 9,
            ..Spea2Config::default()
        };
        assert!(matches!(cfg.validate(&p), Err(Error::InvalidConcurrency(9))));

        let cfg = Spea2Config {
            max_generations: 0,
            ..Spea2Config::default()
        };
        assert!(matches!(cfg.validate(&p), Err(Error::InvalidMaxGenerations)));
    }

    #[test]
    fn test_variation_coefficients_stay_in_unit_range() {
        let p = problem();
        let with = |alpha, step_base, step_spread| Spea2Config {
            variation: VariationConfig {
                alpha,
                step_base,
                step_spread,
            },
            ..Spea2Config::default()
        };

        with(0.0, 0.0, 1.0).validate(&p).unwrap();
        with(1.0, 1.0, 0.0).validate(&p).unwrap();
        assert!(matches!(
            with(1.5, 0.1, 0.2).validate(&p),
            Err(Error::OutOfUnitRange { ref name, .. }) if name == "alpha"
        ));
        assert!(matches!(
            with(-0.2, 0.1, 0.2).validate(&p),
            Err(Error::OutOfUnitRange { ref name, .. }) if name == "alpha"
        ));
        assert!(matches!(
            with(0.8, -0.1, 0.2).validate(&p),
            Err(Error::OutOfUnitRange { ref name, .. }) if name == "step_base"
        ));
        assert!(matches!(
            with(0.8, 0.6, 0.6).validate(&p),
            Err(Error::OutOfUnitRange { .. })
        ));
        assert!(matches!(
            with(f64::NAN, 0.1, 0.2).validate(&p),
            Err(Error::NonFinite { .. })
        ));
    }

    #[test]
    fn test_explicit_initializer_shape() {
        let cfg = Spea2Config {
            population_size: 2,
            initializer: Initializer::Explicit(vec![vec![0.1], vec![0.2, 0.3]]),
            ..Spea2Config::default()
        };
        assert!(matches!(
            cfg.validate(&problem()),
            Err(Error::DimensionMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_unknown_initializer() {
        assert_eq!("Random".parse::<Initializer>().unwrap(), Initializer::Random);
        assert!(matches!(
            "Halton".parse::<Initializer>(),
            Err(Error::UnknownVariant {
                kind: "initializer",
                ..
            })
        ));
    }

    #[test]
    fn test_run_config_rejects_unknown_truncation() {
        let json = r#"{
            "problem": {
                "variables": [{"name": "x", "lower": 0.0, "upper": 1.0}],
                "targets": [{"name": "y", "direction": "max"}]
            },
            "spea2": {"truncation": "random"}
        }"#;
        assert!(matches!(
            RunConfig::from_json_str(json),
            Err(Error::Storage(_))
        ));
    }
}
