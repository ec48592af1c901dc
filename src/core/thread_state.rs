//! Per-thread nesting counts
//!
//! Each thread keeps its own map from mutex to nesting depth. Nothing here is
//! shared between threads, so no locking is involved.

use crate::core::types::{MutexId, Violation};
use fxhash::FxHashMap;
use std::cell::RefCell;

/// Nesting count per mutex for a single thread
#[derive(Debug, Default)]
pub struct ThreadLockState {
    counts: FxHashMap<MutexId, usize>,
}

impl ThreadLockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more acquisition of `id` and return the new depth
    pub fn increment(&mut self, id: MutexId) -> usize {
        let count = self.counts.entry(id).or_insert(0);
        *count += 1;
        *count
    }

    /// Record one release of `id` and return the remaining depth
    ///
    /// # Errors
    /// Returns `Violation::UnbalancedUnlock` if `id` was not held. The stored
    /// count stays at zero in that case.
    pub fn decrement(&mut self, id: MutexId) -> Result<usize, Violation> {
        match self.counts.get_mut(&id) {
            Some(count) if *count > 0 => {
                *count -= 1;
                let remaining = *count;
                if remaining == 0 {
                    self.counts.remove(&id);
                }
                Ok(remaining)
            }
            _ => {
                self.counts.remove(&id);
                Err(Violation::UnbalancedUnlock {
                    mutex: id,
                    count: -1,
                })
            }
        }
    }

    /// Current depth for `id`, 0 if not held
    pub fn count(&self, id: MutexId) -> usize {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// First held mutex whose label is `name`
    pub fn held_named(&self, name: &str) -> Option<MutexId> {
        self.counts
            .iter()
            .filter(|&(id, &count)| count > 0 && id.name() == name)
            .map(|(&id, _)| id)
            .min()
    }

    /// Every held mutex with its depth, ordered by identity
    pub fn snapshot(&self) -> Vec<(MutexId, usize)> {
        let mut held: Vec<(MutexId, usize)> = self
            .counts
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(&id, &count)| (id, count))
            .collect();
        held.sort_unstable_by_key(|&(id, _)| id);
        held
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

// One state per (thread, debugger instance). Dropped when the thread exits.
thread_local! {
    static THREAD_STATES: RefCell<FxHashMap<usize, ThreadLockState>> =
        RefCell::new(FxHashMap::default());
}

/// Run `f` on the calling thread's state for the debugger with `key`
///
/// The state is created on first use. Returns `None` once the thread's
/// local storage has been torn down.
pub(crate) fn with_thread_state<R>(
    key: usize,
    f: impl FnOnce(&mut ThreadLockState) -> R,
) -> Option<R> {
    THREAD_STATES
        .try_with(|states| {
            let mut states = states.borrow_mut();
            f(states.entry(key).or_default())
        })
        .ok()
}

/// Read-only access to the calling thread's state, without creating it
pub(crate) fn peek_thread_state<R>(
    key: usize,
    f: impl FnOnce(Option<&ThreadLockState>) -> R,
) -> Option<R> {
    THREAD_STATES
        .try_with(|states| f(states.borrow().get(&key)))
        .ok()
}
