//! Immutable parameter vectors.
//!
//! A [`ParameterVector`] holds one real value per design variable, in the
//! order fixed by the [`Problem`](crate::Problem). Vectors are never mutated
//! once built: crossover and mutation produce new vectors through the
//! arithmetic operators and [`ParameterVector::with_value`].
//!
//! # Example
//!
//! ```
//! use spea2::ParameterVector;
//!
//! let a = ParameterVector::new(vec![1.0, 2.0]).unwrap();
//! let b = ParameterVector::new(vec![3.0, 4.0]).unwrap();
//!
//! let child = &a * 0.8 + &b * 0.2;
//! assert!((child[0] - 1.4).abs() < 1e-12);
//! assert_eq!(a.as_slice(), &[1.0, 2.0]); // parents are untouched
//! ```

use core::ops::{Add, Index, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An ordered, fixed-length sequence of design variable values.
///
/// Equality is exact element-wise `f64` equality. For hashing (e.g. when the
/// archive deduplicates individuals) use [`ParameterVector::key`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(Vec<f64>);

/// Hashable bit-exact identity of a [`ParameterVector`].
///
/// `-0.0` and `0.0` are folded together so that vectors that compare equal
/// also hash equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamKey(Vec<u64>);

impl ParameterVector {
    /// Build a vector, rejecting NaN and infinite values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonFinite`] if any value is not finite.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if let Some((i, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(Error::NonFinite {
                name: format!("parameter[{i}]"),
                value,
            });
        }
        Ok(Self(values))
    }

    /// Build a vector without validation. Callers guarantee finiteness.
    pub(crate) fn from_vec(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a zero-dimensional vector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the values.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Iterate over the values.
    pub fn iter(&self) -> core::slice::Iter<'_, f64> {
        self.0.iter()
    }

    /// Return a copy with position `index` replaced by `value`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn with_value(&self, index: usize, value: f64) -> Self {
        let mut values = self.0.clone();
        values[index] = value;
        Self(values)
    }

    /// Arithmetic blend `self * alpha + other * (1 - alpha)`.
    #[must_use]
    pub fn blend(&self, other: &Self, alpha: f64) -> Self {
        self * alpha + other * (1.0 - alpha)
    }

    /// Hashable identity used for exact-duplicate detection.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn key(&self) -> ParamKey {
        ParamKey(
            self.0
                .iter()
                .map(|&v| if v == 0.0 { 0 } else { v.to_bits() })
                .collect(),
        )
    }
}

impl Index<usize> for ParameterVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a ParameterVector {
    type Item = &'a f64;
    type IntoIter = core::slice::Iter<'a, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Mul<f64> for &ParameterVector {
    type Output = ParameterVector;

    fn mul(self, rhs: f64) -> ParameterVector {
        ParameterVector(self.0.iter().map(|v| v * rhs).collect())
    }
}

impl Mul<f64> for ParameterVector {
    type Output = ParameterVector;

    fn mul(self, rhs: f64) -> ParameterVector {
        &self * rhs
    }
}

impl Add for &ParameterVector {
    type Output = ParameterVector;

    fn add(self, rhs: &ParameterVector) -> ParameterVector {
        assert_eq!(self.len(), rhs.len(), "parameter vector length mismatch");
        ParameterVector(self.0.iter().zip(&rhs.0).map(|(a, b)| a + b).collect())
    }
}

impl Add for ParameterVector {
    type Output = ParameterVector;

    fn add(self, rhs: ParameterVector) -> ParameterVector {
        &self + &rhs
    }
}

impl Sub for &ParameterVector {
    type Output = ParameterVector;

    fn sub(self, rhs: &ParameterVector) -> ParameterVector {
        assert_eq!(self.len(), rhs.len(), "parameter vector length mismatch");
        ParameterVector(self.0.iter().zip(&rhs.0).map(|(a, b)| a - b).collect())
    }
}

impl Sub for ParameterVector {
    type Output = ParameterVector;

    fn sub(self, rhs: ParameterVector) -> ParameterVector {
        &self - &rhs
    }
}
