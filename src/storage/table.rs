//! Dense per-generation tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::generation::Generation;
use crate::individual::Individual;
use crate::problem::Problem;

/// Numeric tables indexed `[generation][individual]`.
///
/// Missing measurements (individuals that never evaluated) and non-finite
/// fitness values are stored as `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationTable {
    variables: Vec<String>,
    targets: Vec<String>,
    constraints: Vec<String>,
    /// `[g][i][v]` population parameters.
    pub parameters: Vec<Vec<Vec<f64>>>,
    /// `[g][i][v]` archive parameters.
    pub archive_parameters: Vec<Vec<Vec<f64>>>,
    /// Output name to `[g][i]` population values.
    pub values: BTreeMap<String, Vec<Vec<Option<f64>>>>,
    /// Output name to `[g][i]` archive values.
    pub archive_values: BTreeMap<String, Vec<Vec<Option<f64>>>>,
    /// `[g][i]` population scalar fitness.
    pub fitness: Vec<Vec<Option<f64>>>,
    /// `[g][i]` archive scalar fitness, as ranked in the archive.
    pub archive_fitness: Vec<Vec<Option<f64>>>,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

impl GenerationTable {
    /// Empty tables with room for `max_generations` rows.
    pub(crate) fn new(problem: &Problem, max_generations: usize) -> Self {
        let outputs: Vec<String> = problem.output_names().map(str::to_owned).collect();
        let empty = || -> BTreeMap<String, Vec<Vec<Option<f64>>>> {
            outputs
                .iter()
                .map(|name| (name.clone(), Vec::with_capacity(max_generations)))
                .collect()
        };
        Self {
            variables: problem.variables().iter().map(|v| v.name.clone()).collect(),
            targets: problem.targets().iter().map(|t| t.name.clone()).collect(),
            constraints: problem.constraints().iter().map(|c| c.name.clone()).collect(),
            parameters: Vec::with_capacity(max_generations),
            archive_parameters: Vec::with_capacity(max_generations),
            values: empty(),
            archive_values: empty(),
            fitness: Vec::with_capacity(max_generations),
            archive_fitness: Vec::with_capacity(max_generations),
        }
    }

    /// Number of rows written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Returns `true` if no generation has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Variable names, in column order of the parameter tables.
    #[must_use]
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Values of output `name` for generation `g`'s population.
    #[must_use]
    pub fn column(&self, name: &str, g: usize) -> Option<&[Option<f64>]> {
        self.values.get(name)?.get(g).map(Vec::as_slice)
    }

    pub(crate) fn push(&mut self, generation: &Generation) {
        let params = |group: &[Individual]| -> Vec<Vec<f64>> {
            group.iter().map(|i| i.params().as_slice().to_vec()).collect()
        };
        self.parameters.push(params(&generation.individuals));
        self.archive_parameters.push(params(&generation.archive));

        self.fitness.push(
            generation
                .individuals
                .iter()
                .map(|i| finite(i.fitness.fitness))
                .collect(),
        );
        self.archive_fitness.push(
            generation
                .archive
                .iter()
                .map(|i| finite(i.effective_fitness().fitness))
                .collect(),
        );

        let n_targets = self.targets.len();
        for (k, name) in self.targets.iter().chain(&self.constraints).enumerate() {
            let value = |ind: &Individual| {
                ind.measurements.as_ref().and_then(|m| {
                    if k < n_targets {
                        m.targets.get(k).copied()
                    } else {
                        m.constraints.get(k - n_targets).copied()
                    }
                })
            };
            let row = generation.individuals.iter().map(value).collect();
            let archive_row = generation.archive.iter().map(value).collect();
            self.values.entry(name.clone()).or_default().push(row);
            self.archive_values
                .entry(name.clone())
                .or_default()
                .push(archive_row);
        }
    }
}
