//! Core enums shared across the optimizer.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Whether a target is to be maximized or minimized.
///
/// Minimized targets are compared through their reciprocal, so every target
/// is "larger is better" once mapped by [`Direction::oriented`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Direction {
    /// Minimize the target value.
    Minimize,
    /// Maximize the target value.
    Maximize,
}

impl Direction {
    /// Map a raw target value into "larger is better" space.
    #[must_use]
    pub fn oriented(self, value: f64) -> f64 {
        match self {
            Direction::Maximize => value,
            Direction::Minimize => 1.0 / value,
        }
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" | "maximize" => Ok(Direction::Maximize),
            "min" | "minimize" => Ok(Direction::Minimize),
            _ => Err(Error::UnknownVariant {
                kind: "direction",
                value: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Direction> for String {
    fn from(d: Direction) -> Self {
        d.to_string()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Minimize => "minimize",
            Direction::Maximize => "maximize",
        })
    }
}

/// Which side of its bound a constraint must stay on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConstraintKind {
    /// The measured value must not exceed the bound.
    Max,
    /// The measured value must not fall below the bound.
    Min,
}

impl ConstraintKind {
    /// Normalized violation of `value` against `bound`; zero when satisfied.
    #[must_use]
    pub fn violation(self, value: f64, bound: f64) -> f64 {
        let violated = match self {
            ConstraintKind::Max => value > bound,
            ConstraintKind::Min => value < bound,
        };
        if violated {
            (value - bound).abs() / bound.abs()
        } else {
            0.0
        }
    }
}

impl FromStr for ConstraintKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(ConstraintKind::Max),
            "min" => Ok(ConstraintKind::Min),
            _ => Err(Error::UnknownVariant {
                kind: "constraint kind",
                value: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for ConstraintKind {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ConstraintKind> for String {
    fn from(k: ConstraintKind) -> Self {
        match k {
            ConstraintKind::Max => "max".to_owned(),
            ConstraintKind::Min => "min".to_owned(),
        }
    }
}

/// Evaluation state of an individual.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationStatus {
    /// Created but not yet handed to the evaluator.
    #[default]
    NotEvaluated,
    /// Measurements are available.
    Evaluated,
    /// The last evaluation attempt failed.
    Failed,
}

/// Which fitness record is authoritative for an archive member.
///
/// Written by environmental selection. Members that came from the newly
/// scored generation use their primary record; members carried over from the
/// previous archive use the record computed while they were re-scored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Not yet selected into an archive (or part of the first archive).
    #[default]
    Unset,
    /// Selected from the current generation.
    FromGeneration,
    /// Carried over from the previous archive.
    FromArchive,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!("max".parse::<Direction>().unwrap(), Direction::Maximize);
        assert_eq!("Minimize".parse::<Direction>().unwrap(), Direction::Minimize);
        assert!(matches!(
            "sideways".parse::<Direction>(),
            Err(Error::UnknownVariant { kind: "direction", .. })
        ));
    }

    #[test]
    fn test_minimize_is_reciprocal() {
        assert!((Direction::Minimize.oriented(4.0) - 0.25).abs() < f64::EPSILON);
        assert!((Direction::Maximize.oriented(4.0) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_violation() {
        assert!(ConstraintKind::Max.violation(0.5, 1.0).abs() < f64::EPSILON);
        assert!((ConstraintKind::Max.violation(1.5, 1.0) - 0.5).abs() < 1e-12);
        assert!((ConstraintKind::Min.violation(5.0, 10.0) - 0.5).abs() < 1e-12);
        assert!(ConstraintKind::Min.violation(10.0, 10.0).abs() < f64::EPSILON);
        // Negative bounds are normalized by their magnitude.
        assert!((ConstraintKind::Max.violation(-1.0, -2.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_serde_strings() {
        let d: Direction = serde_json::from_str("\"min\"").unwrap();
        assert_eq!(d, Direction::Minimize);
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"minimize\"");
        assert!(serde_json::from_str::<ConstraintKind>("\"between\"").is_err());
    }
}
