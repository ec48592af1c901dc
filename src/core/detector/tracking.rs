use crate::core::detector::{Debugger, debugger};
use crate::core::logger::{self, LockEvent};
use crate::core::thread_state::{ThreadLockState, with_thread_state};
use crate::core::types::{MutexId, Violation, get_current_thread_id};

impl Debugger {
    /// Record that the calling thread is about to acquire `id`
    ///
    /// Call this before taking the real lock. Any violation is handed to the
    /// violation callback, which aborts the process by default.
    ///
    /// # Arguments
    /// * `id` - The mutex being acquired; `None` is ignored
    pub fn entering(&self, id: impl Into<Option<MutexId>>) {
        let Some(id) = id.into() else {
            return;
        };
        logger::log_event(get_current_thread_id(), id, LockEvent::Entering);

        if let Err(violation) = self.check_entering(id) {
            self.handle_violation(violation);
        }
    }

    /// Record that the calling thread has released `id`
    ///
    /// # Arguments
    /// * `id` - The mutex released; `None` is ignored
    pub fn leaving(&self, id: impl Into<Option<MutexId>>) {
        let Some(id) = id.into() else {
            return;
        };
        logger::log_event(get_current_thread_id(), id, LockEvent::Leaving);

        if let Err(violation) = self.check_leaving(id) {
            self.handle_violation(violation);
        }
    }

    /// Update the calling thread's bookkeeping for acquiring `id` and classify
    /// the result, without invoking the violation callback
    ///
    /// # Errors
    /// Returns the first violation found. State is fully updated either way.
    ///
    /// When the acquisition breaks the targeted pair and also closes an order
    /// cycle, only `Violation::ConfiguredPairViolation` is returned. The
    /// ordering edges are still recorded, so the cycle shows up in
    /// `has_edge` and in later reports.
    pub fn check_entering(&self, id: MutexId) -> Result<(), Violation> {
        with_thread_state(self.key, |state| self.check_entering_with(state, id)).unwrap_or(Ok(()))
    }

    /// Update the calling thread's bookkeeping for releasing `id` and classify
    /// the result, without invoking the violation callback
    ///
    /// # Errors
    /// Returns `Violation::UnbalancedUnlock` if `id` was not held
    pub fn check_leaving(&self, id: MutexId) -> Result<(), Violation> {
        with_thread_state(self.key, |state| self.check_leaving_with(state, id)).unwrap_or(Ok(()))
    }

    pub(crate) fn check_entering_with(
        &self,
        state: &mut ThreadLockState,
        id: MutexId,
    ) -> Result<(), Violation> {
        let pair_violation = self.check_targeted_pair(state, id);

        let count = state.increment(id);
        if count > 1 {
            // Reentrant acquisition adds no new ordering
            let mut max_nest = self.max_nest.lock();
            let deepest = max_nest.entry(id).or_insert(0);
            if count > *deepest {
                *deepest = count;
            }
            return pair_violation.map_or(Ok(()), Err);
        }

        let held = state.snapshot();
        let cycle = {
            let mut graph = self.graph.lock();
            graph.ensure_node(id);

            let mut conflict = None;
            for &(prev, _) in &held {
                if prev == id {
                    continue;
                }
                graph.add_edge(prev, id);
                if graph.has_edge(id, prev) {
                    conflict = Some(prev);
                    break;
                }
            }

            conflict.map(|conflicting| Violation::OrderCycle {
                locking: id,
                conflicting,
                also_held: held
                    .iter()
                    .map(|&(other, _)| other)
                    .filter(|&other| other != id && other != conflicting)
                    .collect(),
            })
        };

        match pair_violation.or(cycle) {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    pub(crate) fn check_leaving_with(
        &self,
        state: &mut ThreadLockState,
        id: MutexId,
    ) -> Result<(), Violation> {
        state.decrement(id).map(|_| ())
    }

    fn check_targeted_pair(&self, state: &ThreadLockState, id: MutexId) -> Option<Violation> {
        let pair = self.pair.read();
        let pair = pair.as_ref()?;
        if id.name() != pair.a {
            return None;
        }
        state
            .held_named(&pair.b)
            .filter(|&b| b != id)
            .map(|b| Violation::ConfiguredPairViolation { a: id, b })
    }
}

/// Report an acquisition to the installed debugger
///
/// No-op if no debugger is installed yet or `id` is `None`.
pub fn entering(id: impl Into<Option<MutexId>>) {
    if let Some(debugger) = debugger() {
        debugger.entering(id);
    }
}

/// Report a release to the installed debugger
///
/// No-op if no debugger is installed yet or `id` is `None`.
pub fn leaving(id: impl Into<Option<MutexId>>) {
    if let Some(debugger) = debugger() {
        debugger.leaving(id);
    }
}

/// Configure the targeted pair on the installed debugger
pub fn set_targeted_pair(a: impl Into<String>, b: impl Into<String>) {
    if let Some(debugger) = debugger() {
        debugger.set_targeted_pair(a, b);
    }
}

/// Remove the targeted pair from the installed debugger
pub fn clear_targeted_pair() {
    if let Some(debugger) = debugger() {
        debugger.clear_targeted_pair();
    }
}
