//! SPEA2 fitness assignment.
//!
//! Every evaluated individual receives a [`FitnessRecord`] built from four
//! components:
//!
//! | Component | Meaning |
//! |---|---|
//! | strength | how many individuals of the pool it dominates |
//! | raw fitness | dominance pressure against it; 0 means non-dominated |
//! | distance | nearest-neighbour density estimate in normalized target space |
//! | total error | normalized constraint violation; 0 means feasible |
//!
//! which are folded into the scalar
//!
//! ```text
//! fitness = raw / max_raw + total_error * (20 + g^4) * 1e-8 + 0.1 / (distance + 2)
//! ```
//!
//! where `g` is the generation index and the first term is dropped when no
//! individual is dominated. Lower is better. The constraint penalty grows
//! quartically with `g`, so feasibility pressure sharpens as the search
//! converges.
//!
//! Dominance here is strict in every target: after mapping minimized targets
//! to their reciprocal, `a` dominates `b` only if each of `a`'s values is
//! strictly greater than `b`'s.
//!
//! Generation 0 is scored by [`assign_first`], later generations jointly with
//! the previous archive by [`assign_joint`]. The two use different raw
//! fitness rules: generation 0 counts dominators, later generations sum the
//! dominators' strengths.
//!
//! Individuals without measurements (their evaluation never succeeded), or
//! whose oriented targets are not finite, are left out of every comparison
//! and get [`FitnessRecord::failed`].

use crate::individual::{FitnessRecord, Individual, Measurements};
use crate::problem::Problem;

/// Returns `true` if `a` strictly exceeds `b` in every (oriented) target.
#[must_use]
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    !a.is_empty() && a.iter().zip(b).all(|(x, y)| x > y)
}

/// Target values mapped into "larger is better" space.
#[must_use]
pub fn oriented_targets(problem: &Problem, measurements: &Measurements) -> Vec<f64> {
    problem
        .targets()
        .iter()
        .zip(&measurements.targets)
        .map(|(t, &v)| t.direction.oriented(v))
        .collect()
}

/// Sum of normalized constraint violations. Zero iff every constraint holds.
#[must_use]
pub fn total_error(problem: &Problem, measurements: &Measurements) -> f64 {
    problem
        .constraints()
        .iter()
        .zip(&measurements.constraints)
        .map(|(c, &v)| c.kind.violation(v, c.bound))
        .sum()
}

/// Per-axis scale: the magnitude of the largest value observed on that axis.
///
/// Axes whose maximum is zero or not finite fall back to 1.
#[must_use]
pub fn normalization<'a>(points: impl IntoIterator<Item = &'a [f64]>) -> Vec<f64> {
    let mut maxima: Vec<f64> = Vec::new();
    for p in points {
        if maxima.is_empty() {
            maxima = vec![f64::NEG_INFINITY; p.len()];
        }
        for (m, &v) in maxima.iter_mut().zip(p) {
            *m = m.max(v);
        }
    }
    maxima
        .into_iter()
        .map(|m| {
            let m = m.abs();
            if m > 0.0 && m.is_finite() { m } else { 1.0 }
        })
        .collect()
}

/// Euclidean distance with each axis divided by `scale`.
#[must_use]
pub fn distance(a: &[f64], b: &[f64], scale: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .zip(scale)
        .map(|((x, y), s)| ((x - y) / s).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Combine fitness components into the scalar fitness.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scalar_fitness(record: &FitnessRecord, max_raw_fitness: usize, generation: usize) -> f64 {
    let penalty = record.total_error * (20.0 + (generation as f64).powi(4)) * 1e-8;
    let density = 0.1 / (record.distance + 2.0);
    if max_raw_fitness == 0 {
        penalty + density
    } else {
        record.raw_fitness as f64 / max_raw_fitness as f64 + penalty + density
    }
}

/// The `k`-th smallest value (1-based), or the largest if fewer exist.
fn kth_smallest(mut values: Vec<f64>, k: usize) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    values[k.min(values.len()) - 1]
}

/// Oriented targets of each individual, `None` for unevaluated ones and for
/// points that are not finite once oriented.
fn oriented_points(problem: &Problem, individuals: &[Individual]) -> Vec<Option<Vec<f64>>> {
    individuals
        .iter()
        .map(|ind| {
            ind.measurements
                .as_ref()
                .filter(|_| ind.is_evaluated())
                .map(|m| oriented_targets(problem, m))
                .filter(|p| p.iter().all(|v| v.is_finite()))
        })
        .collect()
}

/// Score generation 0 on its own.
///
/// Strength counts dominated individuals in the population; raw fitness
/// counts dominators (not their strengths); distance is the second-smallest
/// distance to the population including the zero self-distance, i.e. the
/// distance to the nearest other individual.
pub fn assign_first(problem: &Problem, individuals: &mut [Individual], generation: usize) {
    let points = oriented_points(problem, individuals);
    let evaluated: Vec<&[f64]> = points.iter().flatten().map(Vec::as_slice).collect();
    let scale = normalization(evaluated.iter().copied());

    for (ind, point) in individuals.iter_mut().zip(&points) {
        let (Some(p), Some(m)) = (point.as_deref(), ind.measurements.as_ref()) else {
            ind.fitness = FitnessRecord::failed();
            continue;
        };
        let mut record = FitnessRecord {
            total_error: total_error(problem, m),
            ..FitnessRecord::default()
        };
        let mut distances = Vec::with_capacity(evaluated.len());
        for &q in &evaluated {
            if dominates(p, q) {
                record.strength += 1;
            } else if dominates(q, p) {
                record.raw_fitness += 1;
            }
            distances.push(distance(p, q, &scale));
        }
        record.distance = kth_smallest(distances, 2);
        ind.fitness = record;
    }

    let max_raw = individuals
        .iter()
        .zip(&points)
        .filter(|(_, p)| p.is_some())
        .map(|(i, _)| i.fitness.raw_fitness)
        .max()
        .unwrap_or(0);
    for (ind, _) in individuals.iter_mut().zip(&points).filter(|(_, p)| p.is_some()) {
        ind.fitness.fitness = scalar_fitness(&ind.fitness, max_raw, generation);
    }

    trace_debug!(generation, max_raw, "first generation scored");
}

/// Score a new population jointly with the previous archive.
///
/// Population members get their primary [`Individual::fitness`]; archive
/// members get [`Individual::archive_fitness`], which is reset first.
///
/// - strength: individuals dominated over the joint pool
/// - raw fitness: sum of strengths of every dominator in the joint pool
/// - distance, population member: nearest archive member
/// - distance, archive member: second-smallest distance to the archive
///   (nearest other member)
///
/// Distances are normalized by the joint pool's per-target maxima, and raw
/// fitness by the joint pool's largest raw fitness, so the two groups can be
/// ranked against each other during environmental selection.
pub fn assign_joint(
    problem: &Problem,
    population: &mut [Individual],
    archive: &mut [Individual],
    generation: usize,
) {
    let pop_points = oriented_points(problem, population);
    let arc_points = oriented_points(problem, archive);

    for ind in archive.iter_mut() {
        ind.archive_fitness = FitnessRecord::default();
    }

    let joint: Vec<&[f64]> = pop_points
        .iter()
        .chain(&arc_points)
        .flatten()
        .map(Vec::as_slice)
        .collect();
    let archive_only: Vec<&[f64]> = arc_points.iter().flatten().map(Vec::as_slice).collect();
    let scale = normalization(joint.iter().copied());

    let strength = |p: &[f64]| joint.iter().filter(|&&q| dominates(p, q)).count();
    let pop_strength: Vec<usize> = pop_points
        .iter()
        .map(|p| p.as_deref().map_or(0, strength))
        .collect();
    let arc_strength: Vec<usize> = arc_points
        .iter()
        .map(|p| p.as_deref().map_or(0, strength))
        .collect();

    // Sum of strengths of everything in the joint pool that dominates `p`.
    let raw = |p: &[f64]| -> usize {
        let from_pop = pop_points
            .iter()
            .zip(&pop_strength)
            .filter_map(|(q, s)| q.as_deref().filter(|q| dominates(q, p)).map(|_| *s));
        let from_arc = arc_points
            .iter()
            .zip(&arc_strength)
            .filter_map(|(q, s)| q.as_deref().filter(|q| dominates(q, p)).map(|_| *s));
        from_pop.chain(from_arc).sum()
    };

    for ((ind, point), &s) in population.iter_mut().zip(&pop_points).zip(&pop_strength) {
        let (Some(p), Some(m)) = (point.as_deref(), ind.measurements.as_ref()) else {
            ind.fitness = FitnessRecord::failed();
            continue;
        };
        let nearest = archive_only
            .iter()
            .map(|q| distance(p, q, &scale))
            .fold(f64::INFINITY, f64::min);
        ind.fitness = FitnessRecord {
            strength: s,
            raw_fitness: raw(p),
            distance: if nearest.is_finite() { nearest } else { 0.0 },
            total_error: total_error(problem, m),
            fitness: 0.0,
        };
    }

    for ((ind, point), &s) in archive.iter_mut().zip(&arc_points).zip(&arc_strength) {
        let (Some(p), Some(m)) = (point.as_deref(), ind.measurements.as_ref()) else {
            ind.archive_fitness = FitnessRecord::failed();
            continue;
        };
        let distances = archive_only.iter().map(|q| distance(p, q, &scale)).collect();
        ind.archive_fitness = FitnessRecord {
            strength: s,
            raw_fitness: raw(p),
            distance: kth_smallest(distances, 2),
            total_error: total_error(problem, m),
            fitness: 0.0,
        };
    }

    let max_raw = population
        .iter()
        .zip(&pop_points)
        .filter(|(_, p)| p.is_some())
        .map(|(i, _)| i.fitness.raw_fitness)
        .chain(
            archive
                .iter()
                .zip(&arc_points)
                .filter(|(_, p)| p.is_some())
                .map(|(i, _)| i.archive_fitness.raw_fitness),
        )
        .max()
        .unwrap_or(0);

    for (ind, _) in population.iter_mut().zip(&pop_points).filter(|(_, p)| p.is_some()) {
        ind.fitness.fitness = scalar_fitness(&ind.fitness, max_raw, generation);
    }
    for (ind, _) in archive.iter_mut().zip(&arc_points).filter(|(_, p)| p.is_some()) {
        ind.archive_fitness.fitness = scalar_fitness(&ind.archive_fitness, max_raw, generation);
    }

    trace_debug!(generation, max_raw, "generation scored against archive");
}
