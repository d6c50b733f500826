//! Variation operators: initialization, mating, crossover and mutation.
//!
//! New generations are bred from the archive:
//!
//! 1. [`MatingPool`] runs binary tournaments over the archive, preferring
//!    members it has not returned yet in the current cycle.
//! 2. [`crossover`] blends two parents into two children with a fixed
//!    coefficient (0.8 by default, so each child leans towards one parent).
//! 3. [`mutate`] resets at most one coordinate of each child to a uniform
//!    value within that variable's bounds.
//!
//! [`Offspring`] chains the three into a pull-based stream of child pairs,
//! and [`produce`] drains it into a generation of exactly N individuals.

use std::collections::HashSet;

use crate::config::{Initializer, VariationConfig};
use crate::error::{Error, Result};
use crate::generation::Generation;
use crate::individual::Individual;
use crate::parameter::ParameterVector;
use crate::problem::Problem;
use crate::scheduler::Replacement;

/// A draw from `[lo, hi)`; `lo` itself when the bounds coincide.
fn uniform(rng: &mut fastrand::Rng, lo: f64, hi: f64) -> f64 {
    lo + rng.f64() * (hi - lo)
}

/// A uniformly random vector within the problem's bounds.
#[must_use]
pub fn random_parameters(problem: &Problem, rng: &mut fastrand::Rng) -> ParameterVector {
    ParameterVector::from_vec(
        problem
            .lower_bounds()
            .iter()
            .zip(problem.upper_bounds())
            .map(|(&lo, &hi)| uniform(rng, lo, hi))
            .collect(),
    )
}

/// Build the `n` individuals of generation 0.
///
/// # Errors
///
/// Returns a configuration error if explicit vectors do not match the
/// population size or the variable topology.
pub fn initial_population(
    problem: &Problem,
    initializer: &Initializer,
    n: usize,
    rng: &mut fastrand::Rng,
) -> Result<Vec<Individual>> {
    match initializer {
        Initializer::Random => Ok((0..n)
            .map(|_| Individual::new(random_parameters(problem, rng)))
            .collect()),
        #[cfg(feature = "sobol")]
        Initializer::QuasiMonteCarlo => Ok(sobol_population(problem, n, rng.u32(..))),
        Initializer::Explicit(vectors) => {
            if vectors.len() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    got: vectors.len(),
                });
            }
            vectors
                .iter()
                .map(|v| problem.parameters(v.clone()).map(Individual::new))
                .collect()
        }
    }
}

/// Scrambled Sobol points mapped onto the bounds.
#[cfg(feature = "sobol")]
#[allow(clippy::cast_possible_truncation)]
fn sobol_population(problem: &Problem, n: usize, seed: u32) -> Vec<Individual> {
    (0..n)
        .map(|i| {
            let values = problem
                .lower_bounds()
                .iter()
                .zip(problem.upper_bounds())
                .enumerate()
                .map(|(dim, (&lo, &hi))| {
                    let u = f64::from(sobol_burley::sample(i as u32, dim as u32, seed));
                    lo + (hi - lo) * u
                })
                .collect();
            Individual::new(ParameterVector::from_vec(values))
        })
        .collect()
}

/// Two children blended from two parents:
/// `p1 * alpha + p2 * (1 - alpha)` and `p2 * alpha + p1 * (1 - alpha)`.
#[must_use]
pub fn crossover(
    p1: &ParameterVector,
    p2: &ParameterVector,
    alpha: f64,
) -> (ParameterVector, ParameterVector) {
    (p1.blend(p2, alpha), p2.blend(p1, alpha))
}

/// Possibly reset one coordinate to a uniform value within its bounds.
///
/// A trigger step `step_base + step_spread * U(0, 1)` is drawn per call and
/// the child mutates iff a second `U(0, 1)` exceeds it. With the defaults
/// (0.1, 0.2) that happens 70–90% of the time.
#[must_use]
pub fn mutate(
    problem: &Problem,
    config: &VariationConfig,
    params: ParameterVector,
    rng: &mut fastrand::Rng,
) -> ParameterVector {
    let step = config.step_base + config.step_spread * rng.f64();
    if params.is_empty() || rng.f64() <= step {
        return params;
    }
    let idx = rng.usize(..params.len());
    let lo = problem.lower_bounds()[idx];
    let hi = problem.upper_bounds()[idx];
    params.with_value(idx, uniform(rng, lo, hi))
}

/// Endless binary-tournament selection over an archive.
///
/// Each draw picks two distinct archive members uniformly and returns the
/// one with lower effective fitness. Members already returned since the last
/// full cycle are disfavoured: if the first tournament's winner was seen,
/// one more tournament is run and its winner is taken if unseen. Once every
/// member has been returned the seen-set is cleared.
///
/// Yields `None` only for an empty archive.
pub struct MatingPool<'a> {
    archive: &'a [Individual],
    seen: HashSet<u64>,
    rng: fastrand::Rng,
}

impl<'a> MatingPool<'a> {
    /// Create a pool over `archive`.
    #[must_use]
    pub fn new(archive: &'a [Individual], rng: fastrand::Rng) -> Self {
        Self {
            archive,
            seen: HashSet::with_capacity(archive.len()),
            rng,
        }
    }

    fn tournament(&mut self) -> &'a Individual {
        let n = self.archive.len();
        if n == 1 {
            return &self.archive[0];
        }
        let i = self.rng.usize(..n);
        let mut j = self.rng.usize(..n - 1);
        if j >= i {
            j += 1;
        }
        let (a, b) = (&self.archive[i], &self.archive[j]);
        if a.effective_fitness().fitness > b.effective_fitness().fitness {
            b
        } else {
            a
        }
    }
}

impl<'a> Iterator for MatingPool<'a> {
    type Item = &'a Individual;

    fn next(&mut self) -> Option<&'a Individual> {
        if self.archive.is_empty() {
            return None;
        }
        let mut winner = self.tournament();
        if self.seen.contains(&winner.id()) {
            let second = self.tournament();
            if !self.seen.contains(&second.id()) {
                winner = second;
            }
        }
        self.seen.insert(winner.id());
        if self.seen.len() >= self.archive.len() {
            self.seen.clear();
        }
        Some(winner)
    }
}

/// Pull-based stream of mutated child pairs bred from an archive.
pub struct Offspring<'a> {
    problem: &'a Problem,
    config: VariationConfig,
    pool: MatingPool<'a>,
    rng: fastrand::Rng,
}

impl<'a> Offspring<'a> {
    /// Create a stream over `archive`. The random state is forked from `rng`.
    #[must_use]
    pub fn new(
        problem: &'a Problem,
        config: VariationConfig,
        archive: &'a [Individual],
        rng: &mut fastrand::Rng,
    ) -> Self {
        let pool = MatingPool::new(archive, rng.fork());
        Self {
            problem,
            config,
            pool,
            rng: rng.fork(),
        }
    }

    /// Draw two parents, cross them and mutate both children.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExhaustedPool`] if the archive is empty.
    pub fn next_pair(&mut self) -> Result<(Individual, Individual)> {
        let p1 = self.pool.next().ok_or(Error::ExhaustedPool)?;
        let p2 = self.pool.next().ok_or(Error::ExhaustedPool)?;
        let (c1, c2) = crossover(p1.params(), p2.params(), self.config.alpha);
        let c1 = mutate(self.problem, &self.config, c1, &mut self.rng);
        let c2 = mutate(self.problem, &self.config, c2, &mut self.rng);
        Ok((Individual::new(c1), Individual::new(c2)))
    }
}

impl Replacement for Offspring<'_> {
    fn replacement(&mut self) -> Result<Individual> {
        self.next_pair().map(|(first, _)| first)
    }
}

/// Breed generation `index` with exactly `n` individuals from `archive`.
///
/// Children come in pairs; an odd `n` drops the last child.
///
/// # Errors
///
/// Returns [`Error::ExhaustedPool`] if the archive is empty.
pub fn produce(
    problem: &Problem,
    config: VariationConfig,
    archive: &[Individual],
    n: usize,
    index: usize,
    rng: &mut fastrand::Rng,
) -> Result<Generation> {
    let mut offspring = Offspring::new(problem, config, archive, rng);
    let mut individuals = Vec::with_capacity(n + 1);
    while individuals.len() < n {
        let (a, b) = offspring.next_pair()?;
        individuals.push(a);
        individuals.push(b);
    }
    individuals.truncate(n);
    Ok(Generation::new(index, individuals))
}
