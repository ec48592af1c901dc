use crate::core::types::{MutexId, ThreadId, ViolationInfo};
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Kind of hook call recorded in the log
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LockEvent {
    /// A thread is about to acquire the mutex
    Entering,
    /// A thread released the mutex
    Leaving,
}

/// Structure for a single hook call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    /// Thread that performed the action
    pub thread_id: ThreadId,
    /// Identity of the mutex involved
    pub mutex_id: usize,
    /// Label of the mutex involved
    pub mutex: String,
    /// Type of event that occurred
    pub event: LockEvent,
    /// Seconds since Unix Epoch with microsecond precision
    pub timestamp: f64,
}

/// One line of the log file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    /// A new process started writing to the file; ids restart after this
    RunStart { pid: u32, timestamp: String },
    /// A hook call
    Event(LogEntry),
    /// A violation reported to the callback
    Violation {
        thread_id: ThreadId,
        message: String,
        timestamp: String,
    },
}

/// Determines how the logger should operate
#[derive(Debug)]
pub enum LoggerMode {
    /// Logging is disabled entirely
    Disabled,
    /// Log to the specified file
    ToFile(BufWriter<File>),
}

/// Logger writing one JSON record per line
pub struct EventLogger {
    mode: LoggerMode,
    path: Option<PathBuf>,
}

impl Default for EventLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLogger {
    /// Create a new logger with logging disabled
    pub fn new() -> Self {
        EventLogger {
            mode: LoggerMode::Disabled,
            path: None,
        }
    }

    /// Create a new logger that appends to the specified file
    ///
    /// A `{timestamp}` placeholder in the path is replaced with the current
    /// UTC time. A `RunStart` record is written first, so runs appended to
    /// one file can be told apart.
    pub fn with_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = resolve_path(path.as_ref());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        let mut logger = EventLogger {
            mode: LoggerMode::ToFile(BufWriter::new(file)),
            path: Some(path),
        };
        logger.write_record(&LogRecord::RunStart {
            pid: std::process::id(),
            timestamp: Utc::now().to_rfc3339(),
        })?;
        Ok(logger)
    }

    /// Write a record if logging is enabled
    pub fn write_record(&mut self, record: &LogRecord) -> Result<()> {
        if let LoggerMode::ToFile(ref mut writer) = self.mode {
            let json = serde_json::to_string(record).context("Failed to serialize log record")?;
            writeln!(writer, "{json}").context("Failed to write log record")?;
        }
        Ok(())
    }

    /// Push buffered records to disk
    pub fn flush(&mut self) -> Result<()> {
        if let LoggerMode::ToFile(ref mut writer) = self.mode {
            writer.flush().context("Failed to flush log file")?;
        }
        Ok(())
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self.mode, LoggerMode::Disabled)
    }

    /// Path of the file being written, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn resolve_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if raw.contains("{timestamp}") {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        PathBuf::from(raw.replace("{timestamp}", &stamp))
    } else {
        path.to_path_buf()
    }
}

fn now_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0
}

// Global logger instance
lazy_static::lazy_static! {
    static ref GLOBAL_LOGGER: Mutex<EventLogger> = Mutex::new(EventLogger::new());
}

// Lets the hooks skip the logger lock entirely while logging is off
static LOGGING_ENABLED: AtomicBool = AtomicBool::new(false);

/// Set the global logger to use the specified file, or disable logging if None
pub fn init_logger<P: AsRef<Path>>(path: Option<P>) -> Result<()> {
    let Ok(mut global) = GLOBAL_LOGGER.lock() else {
        anyhow::bail!("Failed to acquire lock on global logger");
    };
    global.flush()?;
    *global = match path {
        Some(path) => EventLogger::with_file(path).context("Failed to create logger with file")?,
        None => EventLogger::new(),
    };
    LOGGING_ENABLED.store(global.is_enabled(), Ordering::SeqCst);
    Ok(())
}

/// Log a hook call to the global logger (if enabled)
pub fn log_event(thread_id: ThreadId, id: MutexId, event: LockEvent) {
    if !LOGGING_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let record = LogRecord::Event(LogEntry {
        thread_id,
        mutex_id: id.raw(),
        mutex: id.name().to_string(),
        event,
        timestamp: now_seconds(),
    });
    if let Ok(mut logger) = GLOBAL_LOGGER.lock() {
        let _ = logger.write_record(&record);
    }
}

/// Log a violation to the global logger (if enabled) and flush it
pub fn log_violation(info: &ViolationInfo) {
    if !LOGGING_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let record = LogRecord::Violation {
        thread_id: info.thread_id,
        message: info.violation.to_string(),
        timestamp: info.timestamp.clone(),
    };
    if let Ok(mut logger) = GLOBAL_LOGGER.lock() {
        let _ = logger.write_record(&record);
        let _ = logger.flush();
    }
}

/// Flush all pending log records to disk
pub fn flush_logs() -> Result<()> {
    match GLOBAL_LOGGER.lock() {
        Ok(mut logger) => logger.flush(),
        Err(_) => anyhow::bail!("Failed to acquire lock on global logger"),
    }
}

/// Check if the global logger is enabled
pub fn is_logging_enabled() -> bool {
    LOGGING_ENABLED.load(Ordering::Relaxed)
}

/// Path of the file the global logger writes to, if any
pub fn get_current_log_file() -> Option<PathBuf> {
    GLOBAL_LOGGER
        .lock()
        .ok()
        .and_then(|logger| logger.path().map(Path::to_path_buf))
}
