use fxhash::FxHashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde::ser::{SerializeStruct, Serializer};
use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread identifier type
///
/// Uniquely identifies a thread in the application.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.try_with(|&id| id).unwrap_or(0)
}

// Global counter for mutex identities, 0 is never handed out
static NEXT_MUTEX_ID: AtomicUsize = AtomicUsize::new(1);

lazy_static::lazy_static! {
    static ref INTERNED: Mutex<FxHashMap<&'static str, MutexId>> = Mutex::new(FxHashMap::default());
}

/// Identity token naming one mutex
///
/// Two `MutexId`s are equal only if they come from the same allocation
/// (`MutexId::new`) or the same interned label (`MutexId::intern`). The
/// label is carried along for diagnostics and never takes part in
/// comparisons.
#[derive(Clone, Copy)]
pub struct MutexId {
    raw: usize,
    name: &'static str,
}

impl MutexId {
    /// Allocate a fresh identity carrying the given label
    pub fn new(name: &'static str) -> Self {
        MutexId {
            raw: NEXT_MUTEX_ID.fetch_add(1, Ordering::SeqCst),
            name,
        }
    }

    /// Return the process-wide identity for `name`, allocating it on first use
    pub fn intern(name: &'static str) -> Self {
        *INTERNED
            .lock()
            .entry(name)
            .or_insert_with(|| MutexId::new(name))
    }

    /// Numeric identity of this token
    pub fn raw(&self) -> usize {
        self.raw
    }

    /// Human readable label
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for MutexId {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for MutexId {}

impl Hash for MutexId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for MutexId {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for MutexId {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.raw.cmp(&other.raw)
    }
}

impl fmt::Debug for MutexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MutexId({}#{})", self.name, self.raw)
    }
}

impl fmt::Display for MutexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name, self.raw)
    }
}

impl Serialize for MutexId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("MutexId", 2)?;
        state.serialize_field("id", &self.raw)?;
        state.serialize_field("name", self.name)?;
        state.end()
    }
}

/// A lock discipline violation observed on one thread
///
/// Every variant is fatal under the default policy. The value itself is
/// what the checks return, so callers can inspect it before deciding what
/// to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// A release would drive the nesting count of `mutex` below zero
    UnbalancedUnlock {
        /// The mutex being released
        mutex: MutexId,
        /// The count the release would have produced
        count: isize,
    },
    /// Acquiring `locking` while `conflicting` is held closes a cycle
    OrderCycle {
        /// The mutex being acquired
        locking: MutexId,
        /// The held mutex that was previously recorded as following `locking`
        conflicting: MutexId,
        /// Every other mutex this thread held at the time
        also_held: Vec<MutexId>,
    },
    /// The configured label `a` was acquired while `b` was held
    ConfiguredPairViolation {
        /// The mutex being acquired
        a: MutexId,
        /// The held mutex that must never precede `a`
        b: MutexId,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::UnbalancedUnlock { mutex, count } => {
                write!(f, "ERROR: lock count for {mutex} is {count}")
            }
            Violation::OrderCycle {
                locking,
                conflicting,
                also_held,
            } => {
                write!(
                    f,
                    "mutex problem\n  when locking {locking}\n  {conflicting} was already locked and should not be.\n  configure a targeted pair to debug.\n"
                )?;
                if !also_held.is_empty() {
                    writeln!(
                        f,
                        "also locked before {locking} in this thread (no particular order):"
                    )?;
                    for held in also_held {
                        writeln!(f, "  {held}")?;
                    }
                }
                Ok(())
            }
            Violation::ConfiguredPairViolation { a, b } => {
                write!(f, "****** lockorder error! {b} was locked before {a}")
            }
        }
    }
}

/// A violation together with where and when it was observed
///
/// This is what the violation callback receives.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationInfo {
    /// Thread that triggered the violation
    pub thread_id: ThreadId,
    /// What went wrong
    pub violation: Violation,
    /// RFC 3339 timestamp of detection
    pub timestamp: String,
}

impl ViolationInfo {
    /// Render the full diagnostic text
    pub fn report(&self) -> String {
        format!(
            "[{}] thread {}: {}",
            self.timestamp, self.thread_id, self.violation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_thread_id_consistency() {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let id1 = get_current_thread_id();
            let id2 = get_current_thread_id();
            assert_eq!(id1, id2);
            tx.send(id1).unwrap();
        });

        let thread_id = rx.recv().unwrap();
        handle.join().unwrap();
        assert_ne!(thread_id, get_current_thread_id());
    }

    #[test]
    fn test_mutex_id_identity_not_label() {
        let a = MutexId::new("same");
        let b = MutexId::new("same");
        assert_ne!(a, b);
        assert_eq!(a, a);
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn test_intern_returns_same_identity() {
        let first = MutexId::intern("types::interned");
        let second = MutexId::intern("types::interned");
        assert_eq!(first, second);
        assert_eq!(first.raw(), second.raw());
        assert_ne!(first, MutexId::new("types::interned"));
    }

    #[test]
    fn test_order_cycle_report_lists_other_held() {
        let locking = MutexId::new("A");
        let conflicting = MutexId::new("B");
        let other = MutexId::new("C");
        let violation = Violation::OrderCycle {
            locking,
            conflicting,
            also_held: vec![other],
        };
        let text = violation.to_string();
        assert!(text.contains(&format!("when locking {locking}")));
        assert!(text.contains(&format!("{conflicting} was already locked")));
        assert!(text.contains(&format!("  {other}\n")));
    }

    #[test]
    fn test_violation_serializes_with_kind_tag() {
        let mutex = MutexId::new("L");
        let violation = Violation::UnbalancedUnlock { mutex, count: -1 };
        let json = serde_json::to_value(&violation).unwrap();
        assert_eq!(json["kind"], "unbalanced_unlock");
        assert_eq!(json["mutex"]["name"], "L");
        assert_eq!(json["count"], -1);
    }
}
