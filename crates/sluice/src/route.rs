//! Terminal-folder routing with collision-safe naming.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{RouteError, RouteExhaustedSnafu};
use crate::stage::unique_name;

/// Fixed delay between routing attempts.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Copy a staged file into `dest_folder` under `desired_name`.
///
/// Each attempt re-checks the destination: if a file with the target name
/// already exists, the copy is retargeted to a freshly prefixed
/// alternative instead of overwriting. The whole attempt (collision check
/// included) retries up to `max_attempts` times, since the destination
/// set can change between tries.
///
/// There is a window between the existence check and the copy in which a
/// concurrent writer could claim the same name; processing is serialized
/// on a single worker, so the window is unreachable today. Revisit before
/// parallelizing file handling.
///
/// The staged source is left in place regardless of outcome; the caller
/// owns its cleanup.
pub async fn route(
    staged: &Path,
    dest_folder: &Path,
    desired_name: &str,
    max_attempts: u32,
) -> Result<PathBuf, RouteError> {
    for attempt in 1..=max_attempts {
        let mut dest = dest_folder.join(desired_name);
        if path_exists(&dest).await {
            let alternative = unique_name(desired_name);
            debug!(name = %alternative, "Destination exists, using alternative name");
            dest = dest_folder.join(alternative);
        }

        match tokio::fs::copy(staged, &dest).await {
            Ok(_) => {
                debug!(dest = %dest.display(), "Routed file");
                return Ok(dest);
            }
            Err(e) => {
                error!(attempt, dest = %dest.display(), error = %e, "Failed to move file");
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(RETRY_DELAY).await;
        }
    }

    RouteExhaustedSnafu {
        folder: dest_folder.display().to_string(),
        attempts: max_attempts,
    }
    .fail()
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_route_places_file_under_desired_name() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.json");
        let dest_folder = temp.path().join("validated");
        std::fs::write(&staged, b"{\"k\":1}").unwrap();
        std::fs::create_dir_all(&dest_folder).unwrap();

        let dest = route(&staged, &dest_folder, "abc_in.json", 3).await.unwrap();

        assert_eq!(dest, dest_folder.join("abc_in.json"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"{\"k\":1}");
        // Staged copy remains for the caller's cleanup
        assert!(staged.exists());
    }

    #[tokio::test]
    async fn test_route_collision_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.json");
        let dest_folder = temp.path().join("returns");
        std::fs::write(&staged, b"new content").unwrap();
        std::fs::create_dir_all(&dest_folder).unwrap();
        std::fs::write(dest_folder.join("abc_in.json"), b"old content").unwrap();

        let dest = route(&staged, &dest_folder, "abc_in.json", 3).await.unwrap();

        assert_ne!(dest, dest_folder.join("abc_in.json"));
        assert_eq!(
            std::fs::read(dest_folder.join("abc_in.json")).unwrap(),
            b"old content"
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"new content");
        assert_eq!(std::fs::read_dir(&dest_folder).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_route_fails_after_exhausting_attempts() {
        let temp = TempDir::new().unwrap();
        let staged = temp.path().join("staged.json");
        std::fs::write(&staged, b"{}").unwrap();

        let missing_folder = temp.path().join("does-not-exist");
        let err = route(&staged, &missing_folder, "abc_in.json", 1)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("after 1 attempts"));
        assert!(staged.exists());
    }
}
