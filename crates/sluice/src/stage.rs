//! Stage-then-commit transfer of a source file into the processing area.
//!
//! A detected file is copied out of the watched folder before anything
//! reads it for validation, so the original can be removed early and the
//! watched folder never accumulates half-processed files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use snafu::prelude::*;
use tokio::io::AsyncReadExt;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{StageCopySnafu, StageCreateDirSnafu, StageError};

/// Generate a collision-resistant file name: an 8-character identifier
/// prefixed to the original name.
pub fn unique_name(original: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}_{original}", &id[..8])
}

/// A file copied into the processing area for one processing attempt.
///
/// The staged copy lives exactly as long as the attempt: the orchestrator
/// calls [`cleanup`] on every exit path, success or failure.
#[derive(Debug)]
pub struct StagedFile {
    /// Unique name of the staged copy, also used at the terminal folder.
    pub name: String,
    /// Full path of the staged copy inside the processing area.
    pub path: PathBuf,
}

impl StagedFile {
    pub fn for_original(original: &Path, processing_dir: &Path) -> Self {
        let base = original
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed.json".to_string());
        let name = unique_name(&base);
        let path = processing_dir.join(&name);
        Self { name, path }
    }
}

/// Poll until `path` can be opened and read, the primary defense against
/// consuming a file mid-write.
///
/// A path that does not exist yet counts as retryable: creation events
/// can arrive before the file is visible. Returns false once the
/// attempts are exhausted.
pub async fn wait_for_access(path: &Path, max_attempts: u32, delay: Duration) -> bool {
    for attempt in 1..=max_attempts {
        match tokio::fs::File::open(path).await {
            Ok(mut file) => {
                let mut probe = [0u8; 1];
                match file.read(&mut probe).await {
                    Ok(_) => return true,
                    Err(e) => {
                        debug!(path = %path.display(), attempt, error = %e, "File not readable yet");
                    }
                }
            }
            Err(e) => {
                debug!(path = %path.display(), attempt, error = %e, "File not accessible yet");
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(delay).await;
        }
    }
    false
}

/// Copy `original` into the processing area, then remove the original.
///
/// The copy is the commit point. Once the bytes are safely duplicated, a
/// failure to delete the original is logged and processing continues:
/// duplication is acceptable, data loss is not.
pub async fn stage(original: &Path, staged: &Path) -> Result<(), StageError> {
    if let Some(parent) = staged.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context(StageCreateDirSnafu {
                path: parent.display().to_string(),
            })?;
    }

    tokio::fs::copy(original, staged)
        .await
        .context(StageCopySnafu {
            path: original.display().to_string(),
        })?;
    debug!(staged = %staged.display(), "Copied file into processing area");

    if let Err(e) = tokio::fs::remove_file(original).await {
        error!(path = %original.display(), error = %e, "Unable to remove original file after staging");
    }

    Ok(())
}

/// Best-effort removal of a staged copy. Failures are logged and never
/// surfaced; the caller's return path must not depend on cleanup.
pub async fn cleanup(staged: &Path) {
    match tokio::fs::remove_file(staged).await {
        Ok(()) => debug!(path = %staged.display(), "Cleaned up staged copy"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(path = %staged.display(), error = %e, "Failed to clean up staged copy"),
    }
}
