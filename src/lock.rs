//! Per-file reader/writer locks keyed by canonical path.
//!
//! Every [`ConfigStore`](crate::store::ConfigStore) operation takes one of
//! these locks for the duration of a single call: reads take a shared lock,
//! rewrites take an exclusive lock. Locks are created on first use and live
//! as long as the registry (or until [`PathLockRegistry::clear`]).
//!
//! The locks are not re-entrant. Acquiring a path's lock while the same
//! thread already holds it (for example calling a store write from inside a
//! callback that runs under a store read of the same file) deadlocks.

use parking_lot::{ArcRwLockReadGuard, ArcRwLockWriteGuard, Mutex, RawRwLock, RwLock};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Access mode requested from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Any number of concurrent holders, never together with a writer.
    Shared,
    /// Single holder, excludes every other holder.
    Exclusive,
}

/// Held lock on one path. Released when dropped.
pub enum PathLockGuard {
    Shared(ArcRwLockReadGuard<RawRwLock, ()>),
    Exclusive(ArcRwLockWriteGuard<RawRwLock, ()>),
}

impl PathLockGuard {
    pub fn mode(&self) -> LockMode {
        match self {
            PathLockGuard::Shared(_) => LockMode::Shared,
            PathLockGuard::Exclusive(_) => LockMode::Exclusive,
        }
    }
}

impl std::fmt::Debug for PathLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PathLockGuard").field(&self.mode()).finish()
    }
}

/// Maps canonical file paths to reader/writer locks.
#[derive(Debug, Default)]
pub struct PathLockRegistry {
    locks: Mutex<HashMap<PathBuf, Arc<RwLock<()>>>>,
}

impl PathLockRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `path` can be held in `mode`, then return the guard.
    ///
    /// Fails only if the path cannot be made absolute.
    pub fn acquire(&self, path: &Path, mode: LockMode) -> io::Result<PathLockGuard> {
        let lock = self.lock_for(path)?;
        // The registry mutex is released before blocking on the file lock.
        Ok(match mode {
            LockMode::Shared => PathLockGuard::Shared(lock.read_arc()),
            LockMode::Exclusive => PathLockGuard::Exclusive(lock.write_arc()),
        })
    }

    /// Drop every entry. Guards already handed out stay valid.
    pub fn clear(&self) {
        self.locks.lock().clear();
    }

    /// Number of paths currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, path: &Path) -> io::Result<Arc<RwLock<()>>> {
        let key = lock_key(path)?;
        let mut locks = self.locks.lock();
        Ok(Arc::clone(locks.entry(key).or_default()))
    }
}

/// Canonical identity of a path, also for files that do not exist yet.
pub fn lock_key(path: &Path) -> io::Result<PathBuf> {
    let key = match path.canonicalize() {
        Ok(canonical) => canonical,
        Err(_) => {
            let absolute = std::path::absolute(path)?;
            match (absolute.parent(), absolute.file_name()) {
                (Some(parent), Some(name)) => match parent.canonicalize() {
                    Ok(parent) => parent.join(name),
                    Err(_) => absolute,
                },
                _ => absolute,
            }
        }
    };
    Ok(fold_case(key))
}

#[cfg(windows)]
fn fold_case(path: PathBuf) -> PathBuf {
    PathBuf::from(path.to_string_lossy().to_lowercase())
}

#[cfg(not(windows))]
fn fold_case(path: PathBuf) -> PathBuf {
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_same_file_different_spelling_shares_lock() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let direct = dir.path().join("a.ini");
        let dotted = dir.path().join("sub").join("..").join("a.ini");

        let registry = PathLockRegistry::new();
        let _a = registry.acquire(&direct, LockMode::Shared).unwrap();
        let _b = registry.acquire(&dotted, LockMode::Shared).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_key_for_missing_file_uses_canonical_parent() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.ini");
        let key = lock_key(&missing).unwrap();
        assert_eq!(
            key,
            fold_case(dir.path().canonicalize().unwrap().join("nope.ini"))
        );
    }

    #[test]
    fn test_clear_drops_entries() {
        let dir = TempDir::new().unwrap();
        let registry = PathLockRegistry::new();
        drop(registry.acquire(&dir.path().join("a"), LockMode::Exclusive).unwrap());
        drop(registry.acquire(&dir.path().join("b"), LockMode::Exclusive).unwrap());
        assert_eq!(registry.len(), 2);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_exclusive_waits_for_shared() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.ini");
        let registry = Arc::new(PathLockRegistry::new());

        let reader = registry.acquire(&path, LockMode::Shared).unwrap();
        let (tx, rx) = mpsc::channel();
        let handle = {
            let registry = Arc::clone(&registry);
            let path = path.clone();
            thread::spawn(move || {
                let guard = registry.acquire(&path, LockMode::Exclusive).unwrap();
                tx.send(guard.mode()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(reader);
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            LockMode::Exclusive
        );
        handle.join().unwrap();
    }
}
