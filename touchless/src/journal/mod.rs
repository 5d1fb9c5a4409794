//! The durable deployment journal.
//!
//! An append-only text log that outlives the process: every remediation
//! attempt, every fix script's output, and every error lands here with a
//! timestamp. The journal is never rotated or truncated. The log directory
//! also holds the per-stage fix scripts, overwritten on each attempt and
//! left on disk for operator inspection.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Log file name inside the journal directory.
const LOG_FILE: &str = "deploy.log";

/// Append-only, timestamped log plus fix-script storage.
#[derive(Debug, Clone)]
pub struct Journal {
    dir: PathBuf,
    file: PathBuf,
}

impl Journal {
    /// Opens (creating if necessary) a journal in `dir`.
    pub fn create(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let file = dir.join(LOG_FILE);
        Ok(Self { dir, file })
    }

    /// The directory holding the log and fix scripts.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Appends one timestamped entry. Multi-line entries are kept intact.
    pub async fn append(&self, entry: &str) -> std::io::Result<()> {
        let line = format!("{}: {}\n", Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"), entry);
        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.file)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    /// Path of the fix script for `stage`, `fix_<stage>.<extension>`.
    ///
    /// Stage names become file names, so anything outside `[A-Za-z0-9_-]`
    /// is replaced with `_`.
    #[must_use]
    pub fn fix_script_path(&self, stage: &str, extension: &str) -> PathBuf {
        let safe: String = stage
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("fix_{safe}.{extension}"))
    }
}
