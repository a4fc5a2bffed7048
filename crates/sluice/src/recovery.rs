//! Startup sweep of the processing area.
//!
//! Files found in the processing area at startup are evidence of a prior
//! crash mid-attempt. The in-flight tracker has no durability across
//! restarts, so this sweep is what restores the invariant that every
//! accepted file reaches a terminal folder: each orphan is moved to the
//! returns folder before watching begins.

use std::path::Path;

use tracing::{error, warn};

use crate::route;

/// Move every regular file in `processing` to `returns`, collision-safe.
///
/// Returns the number of files moved. Individual failures are logged and
/// skipped; an unreadable processing area yields zero.
pub async fn sweep_processing_area(
    processing: &Path,
    returns: &Path,
    route_max_attempts: u32,
) -> usize {
    let mut entries = match tokio::fs::read_dir(processing).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(path = %processing.display(), error = %e, "Failed to scan processing area");
            return 0;
        }
    };

    let mut moved = 0usize;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                error!(path = %processing.display(), error = %e, "Error reading processing area");
                break;
            }
        };

        let is_file = entry
            .file_type()
            .await
            .map(|kind| kind.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        match route::route(&path, returns, &name, route_max_attempts).await {
            Ok(_) => {
                warn!(file = %name, "Moved interrupted processing file to returns");
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    error!(path = %path.display(), error = %e, "Failed to remove interrupted file after move");
                }
                moved += 1;
            }
            Err(e) => {
                error!(file = %name, error = %e, "Could not move interrupted file");
            }
        }
    }

    moved
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweep_moves_orphans_to_returns() {
        let temp = TempDir::new().unwrap();
        let processing = temp.path().join("processing");
        let returns = temp.path().join("returns");
        std::fs::create_dir_all(&processing).unwrap();
        std::fs::create_dir_all(&returns).unwrap();
        std::fs::write(processing.join("abc_one.json"), b"{\"a\":1}").unwrap();
        std::fs::write(processing.join("def_two.json"), b"{\"b\":2}").unwrap();

        let moved = sweep_processing_area(&processing, &returns, 3).await;

        assert_eq!(moved, 2);
        assert_eq!(std::fs::read_dir(&processing).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(&returns).unwrap().count(), 2);
        assert_eq!(
            std::fs::read(returns.join("abc_one.json")).unwrap(),
            b"{\"a\":1}"
        );
    }

    #[tokio::test]
    async fn test_sweep_of_empty_area_moves_nothing() {
        let temp = TempDir::new().unwrap();
        let processing = temp.path().join("processing");
        let returns = temp.path().join("returns");
        std::fs::create_dir_all(&processing).unwrap();
        std::fs::create_dir_all(&returns).unwrap();

        assert_eq!(sweep_processing_area(&processing, &returns, 3).await, 0);
    }

    #[tokio::test]
    async fn test_sweep_skips_subdirectories() {
        let temp = TempDir::new().unwrap();
        let processing = temp.path().join("processing");
        let returns = temp.path().join("returns");
        std::fs::create_dir_all(processing.join("nested")).unwrap();
        std::fs::create_dir_all(&returns).unwrap();
        std::fs::write(processing.join("abc_one.json"), b"{}").unwrap();

        let moved = sweep_processing_area(&processing, &returns, 3).await;

        assert_eq!(moved, 1);
        assert!(processing.join("nested").is_dir());
    }

    #[tokio::test]
    async fn test_sweep_of_missing_area_yields_zero() {
        let temp = TempDir::new().unwrap();
        let moved = sweep_processing_area(
            &temp.path().join("never-created"),
            &temp.path().join("returns"),
            3,
        )
        .await;
        assert_eq!(moved, 0);
    }
}
