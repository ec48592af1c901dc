//! # Lockorder
//!
//! A runtime lock order checker for debug builds.
//!
//! Lockorder watches every mutex acquisition and release in a multithreaded
//! program and builds a graph of which mutexes were taken while which others
//! were held. The moment two code paths take the same pair of mutexes in
//! opposite order, it reports the conflict and aborts, long before the two
//! paths ever race into a real deadlock.
//!
//! ## Features
//!
//! - Order cycle detection on every first acquisition
//! - Reentrant acquisition tracking with nesting statistics
//! - Unbalanced unlock detection
//! - Targeted pair assertions ("a must never follow b")
//! - JSON lines event logging and offline replay
//! - Instrumented `Mutex` and `ReentrantMutex` over parking_lot
//!
//! ```rust,no_run
//! use lockorder::{LockOrder, Mutex};
//!
//! LockOrder::new().start().expect("Failed to install lock order debugger");
//!
//! let a = Mutex::named("a", ());
//! let b = Mutex::named("b", ());
//! {
//!     let _a = a.lock();
//!     let _b = b.lock();
//! }
//! // Taking b then a anywhere in the program now aborts.
//! lockorder::program_ending();
//! ```

mod core;
pub use crate::core::{
    Debugger, LockOrder, TargetedPair, ViolationCallback,
    detector::{
        abort_on_violation, clear_targeted_pair, debugger, entering, init_debugger, leaving,
        reporting::{currently_locked, program_ending},
        set_targeted_pair,
    },
    graph::FollowGraph,
    locks::{Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard},
    logger::{
        LockEvent, LogEntry, LogRecord, flush_logs, get_current_log_file, init_logger,
        is_logging_enabled,
    },
    replay::{Replayer, replay_log},
    thread_state::ThreadLockState,
    types::{MutexId, ThreadId, Violation, ViolationInfo, get_current_thread_id},
};
