//! Logging functionality for lockorder
//!
//! Every hook call can be recorded as one JSON line, together with any
//! violations reported. The log can later be replayed through a fresh
//! debugger.

mod event_logger;

pub use event_logger::{
    LockEvent, LogEntry, LogRecord, flush_logs, get_current_log_file,
    init_logger, is_logging_enabled, log_event, log_violation,
};
