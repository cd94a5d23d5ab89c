//! Event debouncing for live reload.
//!
//! Coalesces raw filesystem events into one event per path, so editors that
//! write several times per save only trigger a single reload.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use super::event::{ChangeEvent, ChangeKind};

/// Pending event waiting for its deadline.
struct PendingEvent {
    kind: ChangeKind,
    deadline: Instant,
    last_seen: SystemTime,
}

/// Trailing-edge debouncer keyed by path.
///
/// Every recorded event pushes the path's deadline out by the debounce
/// window. Owned by a single task, so no locking is needed.
pub(crate) struct Debouncer {
    pending: HashMap<PathBuf, PendingEvent>,
    window: Duration,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
        }
    }

    /// Record an event observed now.
    pub fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        self.record_at(path, kind, Instant::now());
    }

    /// Record an event observed at `at`.
    pub fn record_at(&mut self, path: PathBuf, kind: ChangeKind, at: Instant) {
        use std::collections::hash_map::Entry;

        let deadline = at + self.window;
        let last_seen = SystemTime::now();

        match self.pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(PendingEvent {
                    kind,
                    deadline,
                    last_seen,
                });
            }
            Entry::Occupied(mut entry) => match Self::coalesce(entry.get().kind, kind) {
                Some(kind) => {
                    let pending = entry.get_mut();
                    pending.kind = kind;
                    pending.deadline = deadline;
                    pending.last_seen = last_seen;
                }
                // Created then deleted inside one window: nothing to report.
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Coalesce two event kinds.
    ///
    /// Returns `None` if both events cancel out.
    #[allow(clippy::match_same_arms)]
    fn coalesce(existing: ChangeKind, new: ChangeKind) -> Option<ChangeKind> {
        use ChangeKind::{Created, Deleted, Modified};

        match (existing, new) {
            (Created, Created) => Some(Created),
            (Created, Modified) => Some(Created),
            (Created, Deleted) => None,

            (Modified, Created) => Some(Created),
            (Modified, Modified) => Some(Modified),
            (Modified, Deleted) => Some(Deleted),

            // Replaced in place (write-temp-then-rename editors).
            (Deleted, Created) => Some(Modified),
            (Deleted, Modified) => Some(Deleted),
            (Deleted, Deleted) => Some(Deleted),
        }
    }

    /// Remove and return every event whose deadline is at or before `now`,
    /// ordered by deadline.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut ready: Vec<(Instant, ChangeEvent)> = Vec::new();

        self.pending.retain(|path, event| {
            if event.deadline <= now {
                ready.push((
                    event.deadline,
                    ChangeEvent {
                        path: path.clone(),
                        kind: event.kind,
                        timestamp: event.last_seen,
                    },
                ));
                false
            } else {
                true
            }
        });

        ready.sort_by_key(|(deadline, _)| *deadline);
        ready.into_iter().map(|(_, event)| event).collect()
    }

    /// Earliest pending deadline, for timer scheduling.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|e| e.deadline).min()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
