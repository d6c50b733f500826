//! JSONL generation journal.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::generation::Generation;

/// Appends each finished generation as one JSON line.
///
/// Writes take an exclusive file lock and reads a shared one, so another
/// process can follow a running optimization by reading the file.
///
/// # Examples
///
/// ```no_run
/// use spea2::storage::GenerationJournal;
///
/// let journal = GenerationJournal::new("run.jsonl");
/// let finished = GenerationJournal::load("run.jsonl").unwrap();
/// ```
#[derive(Debug)]
pub struct GenerationJournal {
    path: PathBuf,
    /// Serialise in-process writes so we only hold the file lock briefly.
    write_lock: Mutex<()>,
}

impl GenerationJournal {
    /// A journal writing to `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    /// The journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one generation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be opened, locked or
    /// written.
    pub fn append(&self, generation: &Generation) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::Storage(e.to_string()))?;

        file.lock_exclusive()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let line = serde_json::to_string(generation).map_err(|e| Error::Storage(e.to_string()))?;

        writeln!(file, "{line}").map_err(|e| Error::Storage(e.to_string()))?;
        file.flush().map_err(|e| Error::Storage(e.to_string()))?;

        file.unlock().map_err(|e| Error::Storage(e.to_string()))?;

        Ok(())
    }

    /// Read every generation in `path`, oldest first. A missing file yields
    /// an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file exists but cannot be read or a
    /// line does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Vec<Generation>> {
        let file = match File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Storage(e.to_string())),
        };

        file.lock_shared()
            .map_err(|e| Error::Storage(e.to_string()))?;

        let mut generations = Vec::new();
        for line in BufReader::new(&file).lines() {
            let line = line.map_err(|e| Error::Storage(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            generations.push(serde_json::from_str(line).map_err(|e| Error::Storage(e.to_string()))?);
        }

        file.unlock().map_err(|e| Error::Storage(e.to_string()))?;

        Ok(generations)
    }
}
