//! Generation store.
//!
//! A [`GenerationPool`] keeps every finished generation of a run. It is owned
//! by the driver and appended to once per cycle, after evaluation, scoring
//! and archive selection for that generation are done.
//!
//! # Layouts
//!
//! | Mode | Keeps | Use when |
//! |------|-------|----------|
//! | [`StorageMode::Instance`] | full [`Generation`] copies, optionally pruned to parameters | you want fitness and status detail |
//! | [`StorageMode::Table`] | dense numeric tables ([`GenerationTable`]) | generations × population is large |
//!
//! Pools can be saved to and loaded from a JSON snapshot. With the `journal`
//! feature, `GenerationJournal` additionally appends each generation to a
//! JSONL file as soon as it is finished.

#[cfg(feature = "journal")]
mod journal;
mod table;

use std::path::Path;

#[cfg(feature = "journal")]
pub use journal::GenerationJournal;
use serde::{Deserialize, Serialize};
pub use table::GenerationTable;

use crate::error::{Error, Result};
use crate::generation::Generation;
use crate::problem::Problem;

const SNAPSHOT_VERSION: u32 = 1;

/// How finished generations are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Full copies of each generation.
    Instance {
        /// Keep only ids and parameter vectors.
        #[serde(default)]
        prune: bool,
    },
    /// Dense per-generation tables.
    Table,
}

impl Default for StorageMode {
    fn default() -> Self {
        StorageMode::Instance { prune: false }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Records {
    Instance {
        prune: bool,
        generations: Vec<Generation>,
    },
    Table(GenerationTable),
}

/// Append-only record of completed generations.
#[derive(Clone, Debug)]
pub struct GenerationPool {
    records: Records,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    records: &'a Records,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    records: Records,
}

impl GenerationPool {
    /// An empty pool sized for `max_generations` generations of `problem`.
    #[must_use]
    pub fn new(mode: StorageMode, problem: &Problem, max_generations: usize) -> Self {
        let records = match mode {
            StorageMode::Instance { prune } => Records::Instance {
                prune,
                generations: Vec::with_capacity(max_generations),
            },
            StorageMode::Table => Records::Table(GenerationTable::new(problem, max_generations)),
        };
        Self { records }
    }

    /// The storage layout.
    #[must_use]
    pub fn mode(&self) -> StorageMode {
        match &self.records {
            Records::Instance { prune, .. } => StorageMode::Instance { prune: *prune },
            Records::Table(_) => StorageMode::Table,
        }
    }

    /// Number of generations recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.records {
            Records::Instance { generations, .. } => generations.len(),
            Records::Table(table) => table.len(),
        }
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a finished generation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] unless `generation.index` equals
    /// [`len`](Self::len).
    pub fn append(&mut self, generation: &Generation) -> Result<()> {
        if generation.index != self.len() {
            return Err(Error::Internal("generations must be appended in order"));
        }
        match &mut self.records {
            Records::Instance { prune, generations } => {
                let stored = if *prune {
                    Generation {
                        index: generation.index,
                        individuals: generation.individuals.iter().map(|i| i.pruned()).collect(),
                        archive: generation.archive.iter().map(|i| i.pruned()).collect(),
                    }
                } else {
                    generation.clone()
                };
                generations.push(stored);
            }
            Records::Table(table) => table.push(generation),
        }
        trace_debug!(generation = generation.index, "generation stored");
        Ok(())
    }

    /// Stored generations in instance mode, `None` in table mode.
    #[must_use]
    pub fn generations(&self) -> Option<&[Generation]> {
        match &self.records {
            Records::Instance { generations, .. } => Some(generations),
            Records::Table(_) => None,
        }
    }

    /// Stored tables in table mode, `None` in instance mode.
    #[must_use]
    pub fn table(&self) -> Option<&GenerationTable> {
        match &self.records {
            Records::Table(table) => Some(table),
            Records::Instance { .. } => None,
        }
    }

    /// The most recent generation in instance mode.
    #[must_use]
    pub fn last(&self) -> Option<&Generation> {
        self.generations().and_then(<[Generation]>::last)
    }

    /// Write a JSON snapshot to `path`.
    ///
    /// The snapshot is written to a temporary file next to `path` and renamed
    /// into place, so a crash never leaves a truncated file behind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            records: &self.records,
        };

        let parent = path.parent().unwrap_or(Path::new("."));
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            path.file_name().unwrap_or_default().to_string_lossy()
        ));
        let file = std::fs::File::create(&tmp_path).map_err(|e| Error::Storage(e.to_string()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &snapshot)
            .map_err(|e| Error::Storage(e.to_string()))?;
        std::fs::rename(&tmp_path, path).map_err(|e| Error::Storage(e.to_string()))?;
        trace_info!(path = %path.display(), generations = self.len(), "pool saved");
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be read or parsed, or
    /// was written by an unsupported version.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| Error::Storage(e.to_string()))?;
        let snapshot: Snapshot = serde_json::from_reader(std::io::BufReader::new(file))
            .map_err(|e| Error::Storage(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Storage(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        Ok(Self {
            records: snapshot.records,
        })
    }
}
