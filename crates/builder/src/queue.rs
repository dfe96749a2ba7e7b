//! Pull-based work-unit queue
//!
//! Open and building membership live behind one mutex, so the three-way
//! claim / still-building / finished decision is a single atomic read: no
//! worker can observe a unit absent from both sets mid-transition and
//! report a premature "finished".

use crate::deliverable::Deliverable;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Outcome of one claim attempt
#[derive(Debug)]
pub enum Claim {
    /// A unit was atomically moved from open to building; the caller now
    /// owns its execution
    Ready(Deliverable),
    /// Nothing open, but units are still building; retry later
    InFlight,
    /// Both sets empty: the queue is drained. Repeatable.
    Finished,
}

#[derive(Debug, Default)]
struct QueueState {
    open: HashMap<String, Deliverable>,
    building: HashSet<String>,
}

/// Claim queue for one build instruction
#[derive(Debug, Default)]
pub struct DeliverableQueue {
    state: Mutex<QueueState>,
}

impl DeliverableQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // No panic can occur while the lock is held; recover the data if
        // one ever does.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a freshly generated unit into the open set.
    ///
    /// A unit id never re-enters the queue once it has left building, and
    /// an id is a member of at most one set; insertion of a known id is a
    /// logic error upstream and is ignored.
    pub fn insert(&self, deliverable: Deliverable) {
        let mut state = self.lock();
        let id = deliverable.id().to_string();
        if !state.building.contains(&id) {
            state.open.entry(id).or_insert(deliverable);
        }
    }

    /// Atomically claim the next open unit, or report queue status.
    /// Selection order is unspecified.
    pub fn claim_next(&self) -> Claim {
        let mut state = self.lock();
        if let Some(id) = state.open.keys().next().cloned() {
            let deliverable = match state.open.remove(&id) {
                Some(d) => d,
                None => return Claim::InFlight,
            };
            state.building.insert(id);
            return Claim::Ready(deliverable);
        }
        if state.building.is_empty() {
            Claim::Finished
        } else {
            Claim::InFlight
        }
    }

    /// Report a claimed unit finished. Success and failure both remove the
    /// id from building; a failed unit is not resubmitted. Returns whether
    /// the id was actually building.
    pub fn complete(&self, id: &str) -> bool {
        self.lock().building.remove(id)
    }

    /// True when both sets are empty
    #[must_use]
    pub fn is_drained(&self) -> bool {
        let state = self.lock();
        state.open.is_empty() && state.building.is_empty()
    }

    #[must_use]
    pub fn open_ids(&self) -> Vec<String> {
        self.lock().open.keys().cloned().collect()
    }

    #[must_use]
    pub fn building_ids(&self) -> Vec<String> {
        self.lock().building.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unit(doc: &str, format: &str) -> Deliverable {
        Deliverable::new(
            doc.into(),
            format.into(),
            vec![],
            vec![],
            PathBuf::from("/src"),
            PathBuf::from("/out"),
            PathBuf::from("/usr/bin"),
            0,
        )
    }

    #[test]
    fn claim_moves_open_to_building() {
        let queue = DeliverableQueue::new();
        queue.insert(unit("DC-a", "html"));
        assert_eq!(queue.open_ids().len(), 1);

        let claimed = match queue.claim_next() {
            Claim::Ready(d) => d,
            other => panic!("expected Ready, got {other:?}"),
        };
        assert!(queue.open_ids().is_empty());
        assert_eq!(queue.building_ids(), vec![claimed.id().to_string()]);
    }

    #[test]
    fn in_flight_until_completion_then_finished() {
        let queue = DeliverableQueue::new();
        queue.insert(unit("DC-a", "html"));
        let d = match queue.claim_next() {
            Claim::Ready(d) => d,
            other => panic!("expected Ready, got {other:?}"),
        };
        assert!(matches!(queue.claim_next(), Claim::InFlight));

        assert!(queue.complete(d.id()));
        assert!(matches!(queue.claim_next(), Claim::Finished));
        // finished is idempotent
        assert!(matches!(queue.claim_next(), Claim::Finished));
    }

    #[test]
    fn failed_units_also_drain() {
        let queue = DeliverableQueue::new();
        queue.insert(unit("DC-a", "html"));
        queue.insert(unit("DC-a", "pdf"));
        let mut claimed = Vec::new();
        while let Claim::Ready(d) = queue.claim_next() {
            claimed.push(d);
        }
        assert_eq!(claimed.len(), 2);
        // one success, one failure: both remove the id
        queue.complete(claimed[0].id());
        queue.complete(claimed[1].id());
        assert!(matches!(queue.claim_next(), Claim::Finished));
    }

    #[test]
    fn concurrent_claims_never_duplicate() {
        use std::sync::Arc;

        let queue = Arc::new(DeliverableQueue::new());
        let mut expected = std::collections::HashSet::new();
        for i in 0..64 {
            let d = unit(&format!("DC-{i}"), "html");
            expected.insert(d.id().to_string());
            queue.insert(d);
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(std::thread::spawn(move || {
                let mut mine = Vec::new();
                loop {
                    match queue.claim_next() {
                        Claim::Ready(d) => {
                            mine.push(d.id().to_string());
                            queue.complete(d.id());
                        }
                        Claim::InFlight => std::thread::yield_now(),
                        Claim::Finished => break,
                    }
                }
                mine
            }));
        }

        let mut seen = std::collections::HashSet::new();
        let mut total = 0usize;
        for h in handles {
            for id in h.join().unwrap() {
                assert!(seen.insert(id), "a unit was claimed twice");
                total += 1;
            }
        }
        assert_eq!(total, 64);
        assert_eq!(seen, expected);
    }
}
