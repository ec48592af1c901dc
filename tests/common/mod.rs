use lockorder::{LockOrder, MutexId, Violation, ViolationInfo};
use std::sync::{Mutex as StdMutex, Once};

static START: Once = Once::new();
static RECORDED: StdMutex<Vec<ViolationInfo>> = StdMutex::new(Vec::new());

/// Install the process-wide debugger once, recording violations instead of aborting
pub fn start_debugger() {
    START.call_once(|| {
        LockOrder::new()
            .callback(|info| {
                RECORDED
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(info);
            })
            .start()
            .expect("Failed to install lock order debugger");
    });
}

fn mentions(violation: &Violation, id: MutexId) -> bool {
    match violation {
        Violation::UnbalancedUnlock { mutex, .. } => *mutex == id,
        Violation::OrderCycle {
            locking,
            conflicting,
            ..
        } => *locking == id || *conflicting == id,
        Violation::ConfiguredPairViolation { a, b } => *a == id || *b == id,
    }
}

/// Violations recorded so far that name `id`
///
/// Tests in one binary share the debugger, so each test filters by its own
/// mutexes.
#[allow(dead_code)]
pub fn violations_involving(id: MutexId) -> Vec<Violation> {
    RECORDED
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .filter(|info| mentions(&info.violation, id))
        .map(|info| info.violation.clone())
        .collect()
}
