//! Isolated evaluation directories.
//!
//! External evaluators communicate through files, so two evaluations must
//! never run in the same directory at once. A [`Workspace`] mirrors a
//! template directory into `<template>_temp/0`, `<template>_temp/1`, ... and
//! pairs each copy with a lock. With a concurrency of 1 the template itself
//! is used and nothing is copied.

use core::time::Duration;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::config::MAX_CONCURRENCY;
use crate::error::{Error, Result};

/// A copy is refreshed only when the template file is newer by more than this.
const STALENESS: Duration = Duration::from_secs(1);

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Workspace {
        path: path.to_path_buf(),
        source,
    }
}

/// One directory plus the lock that grants exclusive use of it.
#[derive(Debug)]
pub struct EvaluationContext {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl EvaluationContext {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            lock: Mutex::new(()),
        }
    }

    /// The working directory handed to the evaluator.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Block until no other evaluation uses this directory.
    pub(crate) fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock()
    }
}

/// The set of evaluation contexts available to a run.
#[derive(Debug)]
pub struct Workspace {
    template: Option<PathBuf>,
    temp_root: Option<PathBuf>,
    contexts: Arc<[EvaluationContext]>,
}

impl Workspace {
    /// Mirror `template` into one directory per concurrent evaluation.
    ///
    /// Re-provisioning over existing copies only refreshes files that are
    /// missing or stale.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConcurrency`] outside `1..=8` and
    /// [`Error::Workspace`] if the template is missing or copying fails.
    pub fn provision(template: impl AsRef<Path>, concurrency: usize) -> Result<Self> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(Error::InvalidConcurrency(concurrency));
        }
        let template = template.as_ref();
        if !template.is_dir() {
            return Err(Error::Workspace {
                path: template.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "template directory does not exist",
                ),
            });
        }

        if concurrency == 1 {
            return Ok(Self {
                template: None,
                temp_root: None,
                contexts: Arc::from([EvaluationContext::new(template.to_path_buf())]),
            });
        }

        let temp_root = temp_root(template)?;
        let mut contexts = Vec::with_capacity(concurrency);
        for i in 0..concurrency {
            let dir = temp_root.join(i.to_string());
            mirror(template, &dir)?;
            contexts.push(EvaluationContext::new(dir));
        }
        trace_info!(root = %temp_root.display(), concurrency, "workspace provisioned");

        Ok(Self {
            template: Some(template.to_path_buf()),
            temp_root: Some(temp_root),
            contexts: contexts.into(),
        })
    }

    /// Contexts for evaluators that do not use the filesystem.
    ///
    /// Every context points at the current directory; the locks still
    /// serialize evaluations cycled onto the same context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConcurrency`] outside `1..=8`.
    pub fn detached(concurrency: usize) -> Result<Self> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(Error::InvalidConcurrency(concurrency));
        }
        Ok(Self {
            template: None,
            temp_root: None,
            contexts: (0..concurrency)
                .map(|_| EvaluationContext::new(PathBuf::from(".")))
                .collect(),
        })
    }

    /// Number of contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Always `false`: a workspace holds at least one context.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// The provisioned contexts.
    #[must_use]
    pub fn contexts(&self) -> &[EvaluationContext] {
        &self.contexts
    }

    pub(crate) fn shared_contexts(&self) -> Arc<[EvaluationContext]> {
        Arc::clone(&self.contexts)
    }

    /// The `<template>_temp` directory, if copies were made.
    #[must_use]
    pub fn temp_root(&self) -> Option<&Path> {
        self.temp_root.as_deref()
    }

    /// Mirror the template into every context again, recreating copies that
    /// were removed by [`teardown`](Self::teardown). Fresh files are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Workspace`] if the template is gone or copying fails.
    pub fn refresh(&self) -> Result<()> {
        let Some(template) = &self.template else {
            return Ok(());
        };
        for ctx in self.contexts.iter() {
            mirror(template, ctx.dir())?;
        }
        trace_debug!(contexts = self.contexts.len(), "workspace refreshed");
        Ok(())
    }

    /// Remove the copies. A missing directory is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Workspace`] if the directory exists but cannot be
    /// removed.
    pub fn teardown(&self) -> Result<()> {
        let Some(root) = &self.temp_root else {
            return Ok(());
        };
        match fs::remove_dir_all(root) {
            Ok(()) => {
                trace_info!(root = %root.display(), "workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error(root)(e)),
        }
    }
}

/// `<parent>/<name>_temp` next to the template.
fn temp_root(template: &Path) -> Result<PathBuf> {
    let name = template.file_name().ok_or_else(|| Error::Workspace {
        path: template.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "template path has no directory name",
        ),
    })?;
    let mut temp_name = name.to_os_string();
    temp_name.push("_temp");
    Ok(template.with_file_name(temp_name))
}

/// Recursively copy `source` into `dest`, skipping up-to-date files.
fn mirror(source: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(io_error(dest))?;
    for entry in fs::read_dir(source).map_err(io_error(source))? {
        let entry = entry.map_err(io_error(source))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let kind = entry.file_type().map_err(io_error(&from))?;
        if kind.is_dir() {
            mirror(&from, &to)?;
        } else if is_stale(&from, &to)? {
            fs::copy(&from, &to).map_err(io_error(&to))?;
            let modified = fs::metadata(&from)
                .and_then(|m| m.modified())
                .map_err(io_error(&from))?;
            fs::File::options()
                .write(true)
                .open(&to)
                .and_then(|f| f.set_modified(modified))
                .map_err(io_error(&to))?;
        }
    }
    Ok(())
}

fn is_stale(from: &Path, to: &Path) -> Result<bool> {
    let Ok(dest_meta) = fs::metadata(to) else {
        return Ok(true);
    };
    let src_time = fs::metadata(from)
        .and_then(|m| m.modified())
        .map_err(io_error(from))?;
    let dest_time = dest_meta.modified().map_err(io_error(to))?;
    Ok(src_time
        .duration_since(dest_time)
        .is_ok_and(|ahead| ahead > STALENESS))
}
