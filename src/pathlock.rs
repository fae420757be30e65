//! Opt-in per-path serialization for concurrent writers.
//!
//! The core save/load operations do not take any lock themselves — the
//! single-writer-per-path responsibility rests with the caller, as the
//! envelope format's crash-safety guarantees only hold for one writer at a
//! time. `PathLock` is the recommended way to satisfy that responsibility
//! inside one process: acquire a guard for a path before calling `save`, and
//! concurrent savers of the same path serialize automatically. Entries are
//! evicted once no guard references them, so the table never grows with the
//! lifetime of the process — only with the number of paths concurrently in
//! flight.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

pub type PathGuard = ArcMutexGuard<RawMutex, ()>;

pub struct PathLock {
    table: Mutex<HashMap<PathBuf, Weak<Mutex<()>>>>,
}

impl Default for PathLock {
    fn default() -> Self {
        Self::new()
    }
}

impl PathLock {
    pub fn new() -> Self {
        Self { table: Mutex::new(HashMap::new()) }
    }

    /// Block until `path` is uncontended, then hold it until the returned
    /// guard drops.
    pub fn lock(&self, path: &Path) -> PathGuard {
        let entry = {
            let mut table = self.table.lock();
            let arc = table.get(path).and_then(Weak::upgrade).unwrap_or_else(|| {
                let fresh = Arc::new(Mutex::new(()));
                table.insert(path.to_path_buf(), Arc::downgrade(&fresh));
                fresh
            });
            table.retain(|_, weak| weak.strong_count() > 0);
            arc
        };
        entry.lock_arc()
    }

    /// Number of paths currently held. Prunes dead entries first, so this
    /// also serves as the eviction point for paths nobody locked again.
    pub fn tracked_paths(&self) -> usize {
        let mut table = self.table.lock();
        table.retain(|_, weak| weak.strong_count() > 0);
        table.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_paths_do_not_contend() {
        let lock = PathLock::new();
        let _a = lock.lock(Path::new("/a"));
        let _b = lock.lock(Path::new("/b"));
        assert_eq!(lock.tracked_paths(), 2);
    }

    #[test]
    fn idle_entries_are_evicted() {
        let lock = PathLock::new();
        {
            let _guard = lock.lock(Path::new("/a"));
        }
        assert_eq!(lock.tracked_paths(), 0, "guard dropped, entry should be gone on next touch");
    }

    #[test]
    fn same_path_reuses_the_same_mutex() {
        let lock = PathLock::new();
        {
            let _guard = lock.lock(Path::new("/a"));
        }
        let _guard = lock.lock(Path::new("/a"));
        assert_eq!(lock.tracked_paths(), 1);
    }
}
