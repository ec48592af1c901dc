use crate::core::detector::{Debugger, debugger};
use crate::core::logger;
use crate::core::thread_state::peek_thread_state;
use crate::core::types::{MutexId, Violation, ViolationInfo, get_current_thread_id};
use chrono::Utc;
use std::fmt::Write;

impl Debugger {
    /// Hand a classified violation to the configured callback
    ///
    /// Must be called outside the graph lock; the callback may do I/O or
    /// never return.
    pub(crate) fn handle_violation(&self, violation: Violation) {
        let info = ViolationInfo {
            thread_id: get_current_thread_id(),
            violation,
            timestamp: Utc::now().to_rfc3339(),
        };
        logger::log_violation(&info);
        (self.callback)(info);
    }

    /// Mutexes held by the calling thread with their nesting depth
    pub fn held(&self) -> Vec<(MutexId, usize)> {
        peek_thread_state(self.key, |state| state.map(|s| s.snapshot()))
            .flatten()
            .unwrap_or_default()
    }

    /// Nesting depth of `id` on the calling thread
    pub fn nesting_count(&self, id: MutexId) -> usize {
        peek_thread_state(self.key, |state| state.map(|s| s.count(id)))
            .flatten()
            .unwrap_or(0)
    }

    /// Render the calling thread's held mutexes, one `  name#id depth` line each
    ///
    /// Empty if the thread holds nothing. Never takes the graph lock.
    pub fn currently_locked(&self) -> String {
        let mut out = String::new();
        for (id, count) in self.held() {
            let _ = writeln!(out, "  {id} {count}");
        }
        out
    }

    /// Whether an edge `pred -> succ` has been recorded
    pub fn has_edge(&self, pred: MutexId, succ: MutexId) -> bool {
        self.graph.lock().has_edge(pred, succ)
    }

    /// Number of distinct edges recorded so far
    pub fn edge_count(&self) -> usize {
        self.graph.lock().edge_count()
    }

    /// Deepest reentrant nesting seen for `id`, if it was ever re-acquired
    pub fn max_nesting(&self, id: MutexId) -> Option<usize> {
        self.max_nest.lock().get(&id).copied()
    }

    /// Summary for operator inspection at shutdown
    ///
    /// Lists the follow graph size and the deepest reentrant nesting observed
    /// per mutex. Purely informational.
    pub fn program_ending(&self) -> String {
        let (nodes, edges) = {
            let graph = self.graph.lock();
            (graph.node_count(), graph.edge_count())
        };
        let mut nesting: Vec<(MutexId, usize)> = self
            .max_nest
            .lock()
            .iter()
            .map(|(&id, &depth)| (id, depth))
            .collect();
        nesting.sort_unstable();

        let mut out = String::new();
        let _ = writeln!(out, "lockorder: {nodes} mutexes, {edges} ordering edges");
        if !nesting.is_empty() {
            let _ = writeln!(out, "max nesting:");
            for (id, depth) in nesting {
                let _ = writeln!(out, "  {id} {depth}");
            }
        }
        out
    }
}

/// Default violation policy: print the report to stderr and abort
pub fn abort_on_violation(info: ViolationInfo) {
    eprintln!("{}", info.report());
    if let Err(e) = logger::flush_logs() {
        eprintln!("Warning: Failed to flush lock order log: {e:?}");
    }
    std::process::abort();
}

/// Render the calling thread's held mutexes on the installed debugger
pub fn currently_locked() -> String {
    debugger()
        .map(|debugger| debugger.currently_locked())
        .unwrap_or_default()
}

/// Print the shutdown summary of the installed debugger to stderr and flush
/// the event log
///
/// Call once, at the end of `main`.
pub fn program_ending() {
    if let Some(debugger) = debugger() {
        eprint!("{}", debugger.program_ending());
    }
    if let Err(e) = logger::flush_logs() {
        eprintln!("Warning: Failed to flush lock order log: {e:?}");
    }
}
