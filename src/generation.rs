//! One iteration's population and archive.

use serde::{Deserialize, Serialize};

use crate::individual::Individual;

/// The population produced at one iteration plus the archive selected from it.
///
/// After a completed cycle both `individuals` and `archive` hold exactly N
/// members. For generation 0 the archive is the population itself.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Generation {
    /// 0-based generation index.
    pub index: usize,
    /// The evaluated population.
    pub individuals: Vec<Individual>,
    /// The archive selected at the end of this generation's cycle.
    pub archive: Vec<Individual>,
}

impl Generation {
    /// A generation with a population and an empty archive.
    #[must_use]
    pub fn new(index: usize, individuals: Vec<Individual>) -> Self {
        Self {
            index,
            individuals,
            archive: Vec::new(),
        }
    }

    /// Number of individuals in the population.
    #[must_use]
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    /// Returns `true` if the population is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Returns `true` if both population and archive hold `n` members.
    #[must_use]
    pub fn is_complete(&self, n: usize) -> bool {
        self.individuals.len() == n && self.archive.len() == n
    }

    /// Archive members ordered by their effective fitness, best first.
    #[must_use]
    pub fn ranked_archive(&self) -> Vec<&Individual> {
        let mut ranked: Vec<&Individual> = self.archive.iter().collect();
        ranked.sort_by(|a, b| {
            a.effective_fitness()
                .fitness
                .total_cmp(&b.effective_fitness().fitness)
        });
        ranked
    }
}
