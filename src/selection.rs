//! Environmental selection: forming the next archive.
//!
//! The archive for cycle g+1 is built from generation g+1 (scored by
//! [`assign_joint`](crate::fitness::assign_joint), primary fitness) and the
//! previous archive (re-scored, archive fitness):
//!
//! 1. seed with feasible, non-dominated population members
//! 2. add feasible, non-dominated previous-archive members
//! 3. if short, merge both groups in ascending fitness order until N,
//!    leaving unmeasured individuals out while measured ones exist
//! 4. if over, truncate to N
//! 5. if still short, repeat the best members
//!
//! Exact duplicates (bitwise-equal parameter vectors) are admitted once.

use core::cmp::Ordering;
use std::collections::HashSet;

use crate::config::Truncation;
use crate::fitness::{distance, normalization, oriented_targets};
use crate::individual::Individual;
use crate::parameter::ParamKey;
use crate::problem::Problem;
use crate::types::Provenance;

// ---------------------------------------------------------------------------
// Candidate set
// ---------------------------------------------------------------------------

/// Ordered, duplicate-free archive under construction.
struct Candidates {
    members: Vec<Individual>,
    keys: HashSet<ParamKey>,
}

impl Candidates {
    fn with_capacity(n: usize) -> Self {
        Self {
            members: Vec::with_capacity(n),
            keys: HashSet::with_capacity(n),
        }
    }

    fn len(&self) -> usize {
        self.members.len()
    }

    /// Admit a copy of `ind` tagged with `provenance` unless its parameters
    /// are already present.
    fn admit(&mut self, ind: &Individual, provenance: Provenance) -> bool {
        if !self.keys.insert(ind.params().key()) {
            return false;
        }
        let mut member = ind.clone();
        member.provenance = provenance;
        self.members.push(member);
        true
    }
}

fn by_fitness<'a>(
    individuals: &'a [Individual],
    record: impl Fn(&Individual) -> f64,
) -> Vec<&'a Individual> {
    let mut sorted: Vec<&Individual> = individuals.iter().collect();
    sorted.sort_by(|a, b| record(a).total_cmp(&record(b)));
    sorted
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Build the archive of `n` members for the next cycle.
///
/// `population` must carry primary fitness and `previous` archive fitness
/// from the same joint scoring pass. The result always holds exactly `n`
/// members when `population` is non-empty: if fewer than `n` distinct
/// parameter vectors exist, already-selected members are repeated under new
/// ids.
#[must_use]
pub fn select_archive(
    problem: &Problem,
    population: &[Individual],
    previous: &[Individual],
    n: usize,
    truncation: Truncation,
) -> Vec<Individual> {
    let mut archive = Candidates::with_capacity(n.max(population.len()));

    for ind in population.iter().filter(|i| i.fitness.is_elite()) {
        archive.admit(ind, Provenance::FromGeneration);
    }
    for ind in previous.iter().filter(|i| i.archive_fitness.is_elite()) {
        archive.admit(ind, Provenance::FromArchive);
    }
    #[cfg(feature = "tracing")]
    let elites = archive.len();

    if archive.len() < n {
        fill(&mut archive, population, previous, n);
    }

    let mut members = archive.members;
    if members.len() > n {
        match truncation {
            Truncation::Density => truncate_by_density(problem, &mut members, n),
            Truncation::Arbitrary => members.truncate(n),
        }
    }

    if members.len() < n && !members.is_empty() {
        let mut best: Vec<usize> = (0..members.len()).collect();
        best.sort_by(|&a, &b| {
            members[a]
                .effective_fitness()
                .fitness
                .total_cmp(&members[b].effective_fitness().fitness)
        });
        for i in 0..n - best.len() {
            let copy = members[best[i % best.len()]].duplicate();
            members.push(copy);
        }
    }

    trace_debug!(elites, size = members.len(), "archive selected");
    members
}

/// Merge both groups by ascending fitness, admitting until `n` members.
///
/// On equal fitness the population member goes first. Unmeasured
/// individuals are left out while any measured one exists; padding repeats
/// measured members instead.
fn fill(archive: &mut Candidates, population: &[Individual], previous: &[Individual], n: usize) {
    let any_measured = population.iter().chain(previous).any(Individual::is_evaluated);
    let eligible = |i: &Individual| !any_measured || i.is_evaluated();
    let generation: Vec<&Individual> = by_fitness(population, |i| i.fitness.fitness)
        .into_iter()
        .filter(|i| eligible(i))
        .collect();
    let archived: Vec<&Individual> = by_fitness(previous, |i| i.archive_fitness.fitness)
        .into_iter()
        .filter(|i| eligible(i))
        .collect();
    let (mut gi, mut ai) = (0, 0);

    while archive.len() < n && (gi < generation.len() || ai < archived.len()) {
        let take_generation = match (generation.get(gi), archived.get(ai)) {
            (Some(g), Some(a)) => g.fitness.fitness <= a.archive_fitness.fitness,
            (Some(_), None) => true,
            _ => false,
        };
        if take_generation {
            archive.admit(generation[gi], Provenance::FromGeneration);
            gi += 1;
        } else {
            archive.admit(archived[ai], Provenance::FromArchive);
            ai += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Truncation
// ---------------------------------------------------------------------------

fn lexicographic(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Iteratively remove the member closest to its neighbours.
///
/// Each round compares members by their sorted distances to all remaining
/// members, smallest first; the lexicographically smallest list loses. Ties
/// remove the earliest inserted member.
fn truncate_by_density(problem: &Problem, members: &mut Vec<Individual>, n: usize) {
    let points: Vec<Vec<f64>> = members
        .iter()
        .map(|ind| {
            ind.measurements
                .as_ref()
                .map_or_else(Vec::new, |m| oriented_targets(problem, m))
        })
        .collect();
    let scale = normalization(points.iter().map(Vec::as_slice));

    let mut alive: Vec<usize> = (0..members.len()).collect();
    while alive.len() > n {
        let neighbours: Vec<Vec<f64>> = alive
            .iter()
            .map(|&i| {
                let mut d: Vec<f64> = alive
                    .iter()
                    .filter(|&&j| j != i)
                    .map(|&j| distance(&points[i], &points[j], &scale))
                    .collect();
                d.sort_by(f64::total_cmp);
                d
            })
            .collect();
        let victim = (0..alive.len())
            .min_by(|&a, &b| lexicographic(&neighbours[a], &neighbours[b]))
            .unwrap_or(alive.len() - 1);
        alive.remove(victim);
    }

    let keep: HashSet<usize> = alive.into_iter().collect();
    let mut index = 0;
    members.retain(|_| {
        let kept = keep.contains(&index);
        index += 1;
        kept
    });
}
