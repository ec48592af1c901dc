pub mod reporting;
pub mod tracking;

pub use reporting::abort_on_violation;
pub use tracking::{clear_targeted_pair, entering, leaving, set_targeted_pair};

use crate::core::graph::FollowGraph;
use crate::core::types::{MutexId, ViolationInfo};
use anyhow::{Result, anyhow};
use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Function invoked with every violation the debugger observes
pub type ViolationCallback = Box<dyn Fn(ViolationInfo) + Send + Sync + 'static>;

/// An explicit ordering assertion between two mutex labels
///
/// While any mutex labelled `b` is held, acquiring a mutex labelled `a` is a
/// violation. `a` then `b` is fine, and so is `b` on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetedPair {
    /// Label that must never be acquired after `b`
    pub a: String,
    /// Label that must not be held when `a` is acquired
    pub b: String,
}

// Keys the per-thread state slot of each debugger instance
static NEXT_DEBUGGER_KEY: AtomicUsize = AtomicUsize::new(1);

/// Lock order debugger
///
/// The Debugger watches every mutex acquisition and release reported to it
/// and checks that all threads agree on one acquisition order.
///
/// # How it works
///
/// 1. Each thread keeps a nesting count per mutex it holds
/// 2. On the first acquisition of a mutex, an edge held -> acquired is added
///    to a shared follow graph for every mutex the thread already holds
/// 3. If the reverse edge is already in the graph, two code paths disagree on
///    the order and the violation callback is invoked
/// 4. Releases decrement the nesting count; releasing an unheld mutex is a
///    violation as well
///
/// The graph lock is a plain `parking_lot::Mutex`, never one of the
/// instrumented wrappers, so the debugger cannot recurse into itself.
pub struct Debugger {
    /// Identifies this instance's slot in thread-local storage
    pub(crate) key: usize,
    /// Precedence edges observed so far, guarded by the graph lock
    pub(crate) graph: Mutex<FollowGraph>,
    /// Highest reentrant depth seen per mutex
    pub(crate) max_nest: Mutex<FxHashMap<MutexId, usize>>,
    /// Optional configured ordering assertion
    pub(crate) pair: RwLock<Option<TargetedPair>>,
    /// Policy applied to detected violations
    pub(crate) callback: ViolationCallback,
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

impl Debugger {
    /// Create a debugger that reports to stderr and aborts on any violation
    pub fn new() -> Self {
        Self::from_callback(Box::new(abort_on_violation))
    }

    /// Create a debugger with a custom violation callback
    ///
    /// If the callback returns, the offending call returns normally and the
    /// bookkeeping stays consistent, so the instrumented lock goes ahead.
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(ViolationInfo) + Send + Sync + 'static,
    {
        Self::from_callback(Box::new(callback))
    }

    pub(crate) fn from_callback(callback: ViolationCallback) -> Self {
        Debugger {
            key: NEXT_DEBUGGER_KEY.fetch_add(1, Ordering::SeqCst),
            graph: Mutex::new(FollowGraph::new()),
            max_nest: Mutex::new(FxHashMap::default()),
            pair: RwLock::new(None),
            callback,
        }
    }

    /// Configure the targeted pair: `a` must never be acquired while `b` is held
    pub fn set_targeted_pair(&self, a: impl Into<String>, b: impl Into<String>) {
        *self.pair.write() = Some(TargetedPair {
            a: a.into(),
            b: b.into(),
        });
    }

    /// Remove the targeted pair
    pub fn clear_targeted_pair(&self) {
        *self.pair.write() = None;
    }

    /// The currently configured targeted pair, if any
    pub fn targeted_pair(&self) -> Option<TargetedPair> {
        self.pair.read().clone()
    }
}

// Process-wide debugger, absent until explicitly installed
static GLOBAL_DEBUGGER: OnceLock<Debugger> = OnceLock::new();

/// Install the process-wide debugger
///
/// Hooks called before this are no-ops.
///
/// # Errors
/// Returns an error if a debugger is already installed
pub fn init_debugger(debugger: Debugger) -> Result<()> {
    GLOBAL_DEBUGGER
        .set(debugger)
        .map_err(|_| anyhow!("lock order debugger is already installed"))
}

/// The installed process-wide debugger, if any
pub fn debugger() -> Option<&'static Debugger> {
    GLOBAL_DEBUGGER.get()
}
