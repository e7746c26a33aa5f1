//! Persistence of step outputs.
//!
//! The raw plan text a step produced is the only context later steps see, so
//! the store is deliberately simple: one opaque text blob per [`StepId`],
//! overwritten each time the step is generated again.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::models::StepId;

/// Errors from reading or writing step outputs.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read output for {step} at {}: {source}", path.display())]
    Read {
        step: StepId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output for {step} at {}: {source}", path.display())]
    Write {
        step: StepId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to list outputs in {}: {source}", dir.display())]
    List {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Storage for the text produced by each step.
///
/// Implementations must treat `save_output` as overwrite: re-running a step
/// replaces its prior output and therefore the context its descendants see.
pub trait OutputStore: Send + Sync {
    /// Load a step's output, or `None` if the step has never been generated.
    fn load_output(&self, step: StepId) -> Result<Option<String>, StoreError>;

    /// Persist a step's output, replacing any previous one.
    fn save_output(&self, step: StepId, text: &str) -> Result<(), StoreError>;

    /// All steps with a stored output, in ascending order.
    fn list_outputs(&self) -> Result<Vec<StepId>, StoreError>;
}

/// [`OutputStore`] backed by one markdown file per step in a directory.
#[derive(Debug, Clone)]
pub struct FsOutputStore {
    dir: PathBuf,
}

impl FsOutputStore {
    const SUFFIX: &str = "_output.md";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name used for a step's output (`step3_output.md`).
    pub fn file_name(step: StepId) -> String {
        format!("{step}{}", Self::SUFFIX)
    }

    fn path_for(&self, step: StepId) -> PathBuf {
        self.dir.join(Self::file_name(step))
    }

    fn step_from_file_name(name: &str) -> Option<StepId> {
        name.strip_suffix(Self::SUFFIX)?.parse().ok()
    }
}

impl OutputStore for FsOutputStore {
    fn load_output(&self, step: StepId) -> Result<Option<String>, StoreError> {
        let path = self.path_for(step);
        match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { step, path, source }),
        }
    }

    fn save_output(&self, step: StepId, text: &str) -> Result<(), StoreError> {
        let path = self.path_for(step);
        let write_err = |source| StoreError::Write {
            step,
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(write_err)?;

        // Write beside the target and rename so readers never see a
        // half-written output.
        let tmp = self.dir.join(format!(".{}.tmp", Self::file_name(step)));
        std::fs::write(&tmp, text).map_err(write_err)?;
        std::fs::rename(&tmp, &path).map_err(write_err)?;

        debug!(%step, path = %path.display(), bytes = text.len(), "saved step output");
        Ok(())
    }

    fn list_outputs(&self) -> Result<Vec<StepId>, StoreError> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::List {
                    dir: self.dir.clone(),
                    source,
                });
            }
        };

        let mut steps: Vec<StepId> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| Self::step_from_file_name(&entry.file_name().to_string_lossy()))
            .collect();
        steps.sort();
        Ok(steps)
    }
}
