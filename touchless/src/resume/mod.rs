//! Durable resume state.
//!
//! The pipeline persists the index of the stage it is about to run, so a
//! crash or reboot mid-stage resumes by re-running that same stage. The
//! store is injected into the runner; tests substitute [`InMemoryResumeStore`].

use crate::errors::PersistenceError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Persists the index of the next stage to run across process restarts.
///
/// A stored value equal to the stage count means the pipeline completed.
/// The value only ever advances; the runner never writes a smaller index.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    /// Returns the last durably recorded stage index, or 0 if none exists.
    async fn get_stage(&self) -> Result<usize, PersistenceError>;

    /// Durably records `index`. Failure is fatal to the pipeline.
    async fn set_stage(&self, index: usize) -> Result<(), PersistenceError>;
}

/// File-backed store: a single human-readable integer.
///
/// The file lives at a fixed well-known path; absence means "start from
/// stage 0". Unreadable content is also treated as 0 rather than an error,
/// so a corrupted file restarts the sequence instead of wedging it.
#[derive(Debug, Clone)]
pub struct FileResumeStore {
    path: PathBuf,
}

impl FileResumeStore {
    /// Creates a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persistence_error(&self, source: std::io::Error) -> PersistenceError {
        PersistenceError {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl ResumeStore for FileResumeStore {
    async fn get_stage(&self) -> Result<usize, PersistenceError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents.trim().parse().unwrap_or(0)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(self.persistence_error(err)),
        }
    }

    async fn set_stage(&self, index: usize) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| self.persistence_error(err))?;
            }
        }
        tokio::fs::write(&self.path, index.to_string())
            .await
            .map_err(|err| self.persistence_error(err))
    }
}

/// Volatile store for tests.
#[derive(Debug, Default)]
pub struct InMemoryResumeStore {
    index: Mutex<Option<usize>>,
}

impl InMemoryResumeStore {
    /// Creates an empty store (reads as stage 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with a stage index.
    #[must_use]
    pub fn with_stage(index: usize) -> Self {
        Self {
            index: Mutex::new(Some(index)),
        }
    }

    /// Returns the stored index without the "absent means 0" mapping.
    #[must_use]
    pub fn stored(&self) -> Option<usize> {
        *self.index.lock()
    }
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn get_stage(&self) -> Result<usize, PersistenceError> {
        Ok(self.index.lock().unwrap_or(0))
    }

    async fn set_stage(&self, index: usize) -> Result<(), PersistenceError> {
        *self.index.lock() = Some(index);
        Ok(())
    }
}
