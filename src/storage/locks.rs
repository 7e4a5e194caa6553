use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Hierarchical locks over logical paths, created on demand.
///
/// Locking `a/b/c` takes shared locks on `a` and `a/b` and an exclusive lock
/// on `a/b/c`, so a mutation of a folder excludes every mutation below it.
/// Locks are always taken from the shallowest segment down.
///
/// Entries are dropped again once nobody holds or waits for them.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

enum Held {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

pub struct PathGuard<'a> {
    owner: &'a PathLocks,
    paths: Vec<String>,
    held: Vec<Held>,
}

/// `a/b/c` -> `["a", "a/b", "a/b/c"]`.
fn lineage(path: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let next = match out.last() {
            Some(parent) => format!("{}/{}", parent, segment),
            None => segment.to_string(),
        };
        out.push(next);
    }
    out
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, path: &str) -> Arc<RwLock<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(path.to_string()).or_default())
    }

    pub async fn acquire(&self, path: &str) -> PathGuard<'_> {
        let paths = lineage(path);
        let mut guard = PathGuard {
            owner: self,
            paths: paths.clone(),
            held: Vec::with_capacity(paths.len()),
        };
        // Register every handle before waiting so cleanup never drops a lock
        // someone is queued on.
        let handles: Vec<_> = paths.iter().map(|p| self.handle(p)).collect();
        let last = handles.len().saturating_sub(1);
        for (i, lock) in handles.into_iter().enumerate() {
            let held = if i == last {
                Held::Exclusive(lock.write_owned().await)
            } else {
                Held::Shared(lock.read_owned().await)
            };
            guard.held.push(held);
        }
        guard
    }

    /// Runs `f` while holding the lock for `path`.
    pub async fn with_path_lock<F, Fut, R>(&self, path: &str, f: F) -> R
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = R>,
    {
        let _guard = self.acquire(path).await;
        f().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        while let Some(held) = self.held.pop() {
            match held {
                Held::Shared(g) => drop(g),
                Held::Exclusive(g) => drop(g),
            }
        }
        let mut locks = self.owner.locks.lock().unwrap_or_else(|e| e.into_inner());
        for path in &self.paths {
            if let Some(lock) = locks.get(path) {
                // Only the map itself still references it.
                if Arc::strong_count(lock) == 1 {
                    locks.remove(path);
                }
            }
        }
    }
}
