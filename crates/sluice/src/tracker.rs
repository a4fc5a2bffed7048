//! Duplicate-event suppression for files currently being processed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory set of source paths with an active processing attempt.
///
/// The watch source may report the same file more than once; acquiring a
/// path that is already tracked fails, and the duplicate event is dropped
/// by the caller. Acquisition is a single check-and-set, so the guarantee
/// holds even if callers overlap.
///
/// Tracking is by exact path string: two different absolute paths that
/// alias the same file (symlinks, bind mounts) are not detected. Entries
/// never outlive a single processing attempt; files orphaned by a crash
/// are handled by the startup recovery sweep instead.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    active: Mutex<HashSet<PathBuf>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `path` as in flight. Returns false, without mutating, if the
    /// path is already tracked.
    pub fn acquire(&self, path: &Path) -> bool {
        self.lock().insert(path.to_path_buf())
    }

    /// Untrack `path`. Safe to call for paths that were never acquired.
    pub fn release(&self, path: &Path) {
        self.lock().remove(path);
    }

    /// Number of paths currently in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        self.active.lock().expect("in-flight tracker lock poisoned")
    }
}
