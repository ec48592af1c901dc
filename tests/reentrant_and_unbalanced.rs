use lockorder::{MutexId, ReentrantMutex, Violation};
mod common;
use common::{start_debugger, violations_involving};

#[test]
fn test_reentrant_locking_counts_depth() {
    start_debugger();
    let debugger = lockorder::debugger().unwrap();

    let mutex = ReentrantMutex::named("reentrant", 5);
    let outer = mutex.lock();
    let inner = mutex.lock();
    assert_eq!(*inner, 5);
    assert_eq!(debugger.nesting_count(mutex.id()), 2);

    drop(inner);
    assert_eq!(debugger.nesting_count(mutex.id()), 1);
    assert_eq!(
        lockorder::currently_locked(),
        format!("  {} 1\n", mutex.id())
    );

    drop(outer);
    assert_eq!(debugger.nesting_count(mutex.id()), 0);
    assert!(!debugger.has_edge(mutex.id(), mutex.id()));
    assert_eq!(debugger.max_nesting(mutex.id()), Some(2));
    assert!(violations_involving(mutex.id()).is_empty());
}

#[test]
fn test_leaving_without_entering_is_unbalanced() {
    start_debugger();

    let id = MutexId::new("never locked");
    lockorder::leaving(id);

    assert_eq!(
        violations_involving(id),
        vec![Violation::UnbalancedUnlock {
            mutex: id,
            count: -1
        }]
    );
}

#[test]
fn test_null_ids_are_ignored() {
    start_debugger();

    lockorder::entering(None::<MutexId>);
    lockorder::leaving(None::<MutexId>);
    assert_eq!(lockorder::currently_locked(), "");
}
