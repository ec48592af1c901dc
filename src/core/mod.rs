// Core types
pub mod types;
pub use types::*;

// Per-thread nesting counts
pub mod thread_state;

// Logging functionality
pub mod logger;
pub use logger::init_logger;

// Graph implementation
pub mod graph;

// Lock order debugger
pub mod detector;
pub use detector::{Debugger, TargetedPair, ViolationCallback, init_debugger};

// Instrumented locks
pub mod locks;

// Offline log checking
pub mod replay;

use anyhow::{Context, Result};

/// Lockorder configuration struct
pub struct LockOrder {
    log_path: Option<String>,
    pair: Option<TargetedPair>,
    callback: ViolationCallback,
}

impl Default for LockOrder {
    fn default() -> Self {
        Self::new()
    }
}

impl LockOrder {
    /// Create a new LockOrder with default settings
    ///
    /// By default:
    /// - Logging is disabled
    /// - No targeted pair is configured
    /// - Violations are printed to stderr and abort the process
    pub fn new() -> Self {
        LockOrder {
            log_path: None,
            pair: None,
            callback: Box::new(detector::abort_on_violation),
        }
    }

    /// Activate logger and set the path for the log file
    ///
    /// # Arguments
    /// * `path` - Path to the log file. If the path contains "{timestamp}",
    ///   it will be replaced with the current timestamp.
    pub fn with_log<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.log_path = Some(path.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Assert that a mutex labelled `a` is never acquired while one labelled
    /// `b` is held
    pub fn targeted_pair(mut self, a: impl Into<String>, b: impl Into<String>) -> Self {
        self.pair = Some(TargetedPair {
            a: a.into(),
            b: b.into(),
        });
        self
    }

    /// Set a custom callback to be invoked when a violation is detected
    ///
    /// This replaces the default abort. If the callback returns, the
    /// offending lock call proceeds.
    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(ViolationInfo) + Send + Sync + 'static,
    {
        self.callback = Box::new(callback);
        self
    }

    /// Install the process-wide debugger with the configured settings
    ///
    /// # Errors
    /// Returns an error if logger initialization fails or a debugger is
    /// already installed
    pub fn start(self) -> Result<()> {
        if let Some(log_path) = self.log_path {
            init_logger(Some(log_path)).context("Failed to initialize logger")?;
        }

        let debugger = Debugger::from_callback(self.callback);
        if let Some(pair) = self.pair {
            debugger.set_targeted_pair(pair.a, pair.b);
        }

        init_debugger(debugger).context("Failed to install lock order debugger")
    }
}
