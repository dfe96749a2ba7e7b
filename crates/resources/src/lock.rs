//! Named resource lock registry

use dashmap::DashMap;
use docbuild_events::{BuildEvent, EventEmitter, EventSender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One registry entry: the mutex that serializes access to the resource
/// plus a count of instructions currently waiting on or holding it. The
/// count exists only to decide whether an entry would be evictable;
/// entries are currently kept for the process lifetime.
#[derive(Debug)]
struct LockEntry {
    mutex: Arc<Mutex<()>>,
    refs: AtomicUsize,
}

/// Process-wide registry of named locks, created lazily on first
/// reference. Resource identity is logical: callers must canonicalize
/// names (the same remote URL must always map to the same string) or
/// locking silently fails to serialize.
#[derive(Debug, Default)]
pub struct ResourceLockRegistry {
    locks: DashMap<String, Arc<LockEntry>>,
}

impl ResourceLockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Block until no other holder has `name` locked, then return a guard
    /// recording `holder` as the current holder. Dropping the guard is the
    /// only release path, which makes double-release unrepresentable.
    ///
    /// No timeout: acquisition blocks for as long as another holder keeps
    /// the lock. No re-entrancy: a task holding `name` that acquires it
    /// again deadlocks.
    pub async fn acquire(
        &self,
        name: &str,
        holder: &str,
        events: Option<&EventSender>,
    ) -> ResourceGuard {
        let entry = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(LockEntry {
                    mutex: Arc::new(Mutex::new(())),
                    refs: AtomicUsize::new(0),
                })
            })
            .clone();
        // The map shard guard is dropped here; the wait happens on the
        // entry's own mutex.
        entry.refs.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = events {
            tx.emit(docbuild_events::AppEvent::Build(BuildEvent::RepoLockWait {
                id: holder.to_string(),
                resource: name.to_string(),
            }));
        }
        let permit = entry.mutex.clone().lock_owned().await;
        if let Some(tx) = events {
            tx.emit(docbuild_events::AppEvent::Build(
                BuildEvent::RepoLockAcquired {
                    id: holder.to_string(),
                    resource: name.to_string(),
                },
            ));
        }
        ResourceGuard {
            _permit: permit,
            entry,
            name: name.to_string(),
            holder: holder.to_string(),
        }
    }

    /// Number of instructions currently waiting on or holding `name`
    #[must_use]
    pub fn references(&self, name: &str) -> usize {
        self.locks
            .get(name)
            .map_or(0, |e| e.refs.load(Ordering::SeqCst))
    }

    /// Number of distinct resource names ever referenced
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Holds the named resource for the guard's lifetime
#[derive(Debug)]
pub struct ResourceGuard {
    _permit: OwnedMutexGuard<()>,
    entry: Arc<LockEntry>,
    name: String,
    holder: String,
}

impl ResourceGuard {
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.entry.refs.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn same_name_serializes() {
        let registry = Arc::new(ResourceLockRegistry::new());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handles = Vec::new();
        for i in 0..4 {
            let registry = Arc::clone(&registry);
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let holder = format!("holder-{i}");
                let guard = registry.acquire("git@remote", &holder, None).await;
                tx.send(("start", i)).unwrap();
                tokio::time::sleep(Duration::from_millis(10)).await;
                tx.send(("end", i)).unwrap();
                drop(guard);
            }));
        }
        drop(tx);
        for h in handles {
            h.await.unwrap();
        }

        // Execution windows must be disjoint: events strictly alternate
        // start/end per holder with no interleaving.
        let mut in_flight = 0usize;
        while let Some((kind, _)) = rx.recv().await {
            match kind {
                "start" => {
                    in_flight += 1;
                    assert_eq!(in_flight, 1, "overlapping lock windows");
                }
                _ => in_flight -= 1,
            }
        }
    }

    #[tokio::test]
    async fn different_names_are_independent() {
        let registry = ResourceLockRegistry::new();
        let a = registry.acquire("remote-a", "h1", None).await;
        // must not block even while remote-a is held
        let b = registry.acquire("remote-b", "h2", None).await;
        assert_eq!(a.resource(), "remote-a");
        assert_eq!(b.resource(), "remote-b");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn reference_count_tracks_guards() {
        let registry = ResourceLockRegistry::new();
        let guard = registry.acquire("remote", "h1", None).await;
        assert_eq!(registry.references("remote"), 1);
        drop(guard);
        assert_eq!(registry.references("remote"), 0);
        // entry is retained after release
        assert_eq!(registry.len(), 1);
    }
}
