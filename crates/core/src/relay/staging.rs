//! Temporary staging of downloaded files.
//!
//! The extraction upload streams from disk, so each request writes its
//! download to `<scratch>/<millis>-<basename>`. The returned [`StagedFile`]
//! owns that path. The pipeline removes it with [`StagedFile::remove`] once the
//! request is decided; dropping an unremoved guard (a cancelled request future,
//! unwinding) deletes it synchronously instead.

use std::path::{Path, PathBuf};

use chrono::Utc;
use docrelay_shared::{AppError, AppResult};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Writes downloads into a scratch directory.
#[derive(Debug, Clone)]
pub struct Stager {
    dir: PathBuf,
}

impl Stager {
    /// Create a stager writing into `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File name for a download of `base_name` staged at `timestamp_ms`.
    #[must_use]
    pub fn staged_name(timestamp_ms: i64, base_name: &str) -> String {
        format!("{timestamp_ms}-{base_name}")
    }

    /// Write `bytes` to a new file named after the current time and `base_name`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::FileSystem`] if the file cannot be created or written.
    pub async fn stage(&self, bytes: &[u8], base_name: &str) -> AppResult<StagedFile> {
        self.stage_at(bytes, base_name, Utc::now().timestamp_millis())
            .await
    }

    /// Write `bytes` to the file name for `timestamp_ms` and `base_name`.
    ///
    /// The file is created exclusively: a name already taken by another
    /// in-flight request is an error, never an overwrite.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::FileSystem`] if the file cannot be created or written.
    pub async fn stage_at(
        &self,
        bytes: &[u8],
        base_name: &str,
        timestamp_ms: i64,
    ) -> AppResult<StagedFile> {
        let file_name = Self::staged_name(timestamp_ms, base_name);
        let path = self.dir.join(&file_name);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::FileSystem(format!("{}: {e}", path.display())))?;

        // From here on the guard owns the path, so a failed write still cleans up.
        let staged = StagedFile {
            path,
            file_name,
            removed: false,
        };

        file.write_all(bytes)
            .await
            .map_err(|e| AppError::FileSystem(format!("{}: {e}", staged.path.display())))?;
        file.flush()
            .await
            .map_err(|e| AppError::FileSystem(format!("{}: {e}", staged.path.display())))?;

        debug!(path = %staged.path.display(), bytes = bytes.len(), "File staged");
        Ok(staged)
    }
}

/// A staged file, removed from disk when dropped.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    file_name: String,
    removed: bool,
}

impl StagedFile {
    /// Full path of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name, `<millis>-<basename>`.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Delete the file without blocking the runtime.
    ///
    /// Failures are logged only; the response is already decided.
    pub async fn remove(mut self) {
        self.removed = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "Staged file removed"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staged file"
            ),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Staged file removed"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove staged file"
            ),
        }
    }
}
