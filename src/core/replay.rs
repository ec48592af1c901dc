//! Offline checking of a recorded event log
//!
//! The replayer feeds logged hook calls through a fresh debugger, keeping one
//! lock state per logged thread, and collects violations instead of
//! terminating. Thread and mutex ids are only meaningful within one run, so
//! every `RunStart` record starts over with an empty debugger.

use crate::core::detector::{Debugger, TargetedPair};
use crate::core::logger::{LockEvent, LogEntry, LogRecord};
use crate::core::thread_state::ThreadLockState;
use crate::core::types::{MutexId, ThreadId, ViolationInfo};
use anyhow::{Context, Result};
use chrono::DateTime;
use fxhash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Re-runs recorded hook calls through a private debugger
pub struct Replayer {
    debugger: Debugger,
    pair: Option<TargetedPair>,
    threads: FxHashMap<ThreadId, ThreadLockState>,
    mutexes: FxHashMap<usize, MutexId>,
    violations: Vec<ViolationInfo>,
}

impl Default for Replayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Replayer {
    pub fn new() -> Self {
        Replayer {
            debugger: Debugger::with_callback(|_| {}),
            pair: None,
            threads: FxHashMap::default(),
            mutexes: FxHashMap::default(),
            violations: Vec::new(),
        }
    }

    /// Check the given targeted pair while replaying
    pub fn with_targeted_pair(mut self, pair: TargetedPair) -> Self {
        self.debugger.set_targeted_pair(pair.a.clone(), pair.b.clone());
        self.pair = Some(pair);
        self
    }

    /// Apply one log line; violation records from the original run are skipped
    pub fn feed_record(&mut self, record: &LogRecord) {
        match record {
            LogRecord::RunStart { .. } => self.start_run(),
            LogRecord::Event(entry) => self.feed(entry),
            LogRecord::Violation { .. } => {}
        }
    }

    /// Forget the graph, lock states and ids of the previous run
    ///
    /// Violations already found are kept.
    pub fn start_run(&mut self) {
        self.debugger = Debugger::with_callback(|_| {});
        if let Some(pair) = &self.pair {
            self.debugger.set_targeted_pair(pair.a.clone(), pair.b.clone());
        }
        self.threads.clear();
        self.mutexes.clear();
    }

    /// Apply one recorded hook call
    pub fn feed(&mut self, entry: &LogEntry) {
        let id = self.resolve(entry);
        let state = self.threads.entry(entry.thread_id).or_default();
        let result = match entry.event {
            LockEvent::Entering => self.debugger.check_entering_with(state, id),
            LockEvent::Leaving => self.debugger.check_leaving_with(state, id),
        };
        if let Err(violation) = result {
            self.violations.push(ViolationInfo {
                thread_id: entry.thread_id,
                violation,
                timestamp: format_timestamp(entry.timestamp),
            });
        }
    }

    /// Violations found so far, in replay order
    pub fn violations(&self) -> &[ViolationInfo] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<ViolationInfo> {
        self.violations
    }

    // One fresh identity per logged id, so identity survives the round trip
    fn resolve(&mut self, entry: &LogEntry) -> MutexId {
        *self.mutexes.entry(entry.mutex_id).or_insert_with(|| {
            let name: &'static str = Box::leak(entry.mutex.clone().into_boxed_str());
            MutexId::new(name)
        })
    }
}

fn format_timestamp(seconds: f64) -> String {
    let secs = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

/// Replay a log file written by the event logger
///
/// # Errors
/// Returns an error if the file cannot be read or a line is not a valid record
pub fn replay_log<P: AsRef<Path>>(
    path: P,
    pair: Option<TargetedPair>,
) -> Result<Vec<ViolationInfo>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Failed to open log file {}", path.display()))?;

    let mut replayer = Replayer::new();
    if let Some(pair) = pair {
        replayer = replayer.with_targeted_pair(pair);
    }

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Failed to read log file")?;
        if line.trim().is_empty() {
            continue;
        }
        let record: LogRecord = serde_json::from_str(&line)
            .with_context(|| format!("Invalid log record on line {}", index + 1))?;
        replayer.feed_record(&record);
    }

    Ok(replayer.into_violations())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Violation;
    use crate::core::logger::LogRecord::Event;
    use std::io::Write;

    fn entry(thread_id: ThreadId, mutex_id: usize, event: LockEvent) -> LogEntry {
        LogEntry {
            thread_id,
            mutex_id,
            mutex: format!("m{mutex_id}"),
            event,
            timestamp: 1_700_000_000.5,
        }
    }

    #[test]
    fn test_replay_finds_cycle_across_threads() {
        let mut replayer = Replayer::new();
        for e in [
            entry(1, 10, LockEvent::Entering),
            entry(1, 20, LockEvent::Entering),
            entry(1, 20, LockEvent::Leaving),
            entry(1, 10, LockEvent::Leaving),
            entry(2, 20, LockEvent::Entering),
            entry(2, 10, LockEvent::Entering),
        ] {
            replayer.feed(&e);
        }

        let violations = replayer.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].thread_id, 2);
        match &violations[0].violation {
            Violation::OrderCycle {
                locking,
                conflicting,
                ..
            } => {
                assert_eq!(locking.name(), "m10");
                assert_eq!(conflicting.name(), "m20");
            }
            other => panic!("expected an order cycle, got {other:?}"),
        }
        assert!(violations[0].timestamp.starts_with("2023-11-14T"));
    }

    #[test]
    fn test_replay_threads_are_independent() {
        let mut replayer = Replayer::new();
        replayer.feed(&entry(1, 10, LockEvent::Entering));
        replayer.feed(&entry(2, 10, LockEvent::Leaving));

        assert!(matches!(
            replayer.violations()[0].violation,
            Violation::UnbalancedUnlock { count: -1, .. }
        ));
    }

    #[test]
    fn test_replay_log_file_with_pair() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let lines = [
            LogRecord::Event(entry(3, 1, LockEvent::Entering)),
            LogRecord::Violation {
                thread_id: 3,
                message: "from the original run".into(),
                timestamp: String::new(),
            },
            LogRecord::Event(entry(3, 2, LockEvent::Entering)),
        ];
        for record in &lines {
            writeln!(file, "{}", serde_json::to_string(record).unwrap()).unwrap();
        }
        writeln!(file).unwrap();
        file.flush().unwrap();

        let pair = TargetedPair {
            a: "m2".into(),
            b: "m1".into(),
        };
        let violations = replay_log(file.path(), Some(pair)).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0].violation,
            Violation::ConfiguredPairViolation { .. }
        ));

        assert!(replay_log(file.path(), None).unwrap().is_empty());
    }

    fn run_start() -> LogRecord {
        LogRecord::RunStart {
            pid: 4242,
            timestamp: "2023-11-14T22:13:20+00:00".into(),
        }
    }

    fn write_log(records: &[LogRecord]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for record in records {
            writeln!(file, "{}", serde_json::to_string(record).unwrap()).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_appended_runs_do_not_share_ids() {
        // Run one takes A(1) then B(2). Run two reuses the raw ids for
        // unrelated mutexes and takes R(2) then Q(1).
        let first_run = [
            Event(entry(1, 1, LockEvent::Entering)),
            Event(entry(1, 2, LockEvent::Entering)),
            Event(entry(1, 2, LockEvent::Leaving)),
            Event(entry(1, 1, LockEvent::Leaving)),
        ];
        let second_run = [
            Event(entry(1, 2, LockEvent::Entering)),
            Event(entry(1, 1, LockEvent::Entering)),
            Event(entry(1, 1, LockEvent::Leaving)),
            Event(entry(1, 2, LockEvent::Leaving)),
        ];

        let mut records = vec![run_start()];
        records.extend(first_run.iter().cloned());
        records.push(run_start());
        records.extend(second_run.iter().cloned());
        let file = write_log(&records);
        assert!(replay_log(file.path(), None).unwrap().is_empty());

        // Without the boundary the same calls do close a cycle
        let merged: Vec<LogRecord> = first_run.into_iter().chain(second_run).collect();
        let file = write_log(&merged);
        let violations = replay_log(file.path(), None).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(matches!(violations[0].violation, Violation::OrderCycle { .. }));
    }

    #[test]
    fn test_run_start_drops_locks_held_by_previous_run() {
        let mut replayer = Replayer::new().with_targeted_pair(TargetedPair {
            a: "m2".into(),
            b: "m1".into(),
        });
        replayer.feed_record(&run_start());
        // The first run died while holding m1
        replayer.feed_record(&Event(entry(5, 1, LockEvent::Entering)));
        replayer.feed_record(&run_start());
        replayer.feed_record(&Event(entry(5, 2, LockEvent::Entering)));
        replayer.feed_record(&Event(entry(5, 1, LockEvent::Leaving)));

        // Only the release of a mutex this run never took is reported
        let violations = replayer.violations();
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0].violation,
            Violation::UnbalancedUnlock { count: -1, .. }
        ));

        // The pair survives the reset
        replayer.feed_record(&Event(entry(5, 1, LockEvent::Entering)));
        replayer.feed_record(&Event(entry(5, 2, LockEvent::Entering)));
        assert!(matches!(
            replayer.violations()[1].violation,
            Violation::ConfiguredPairViolation { .. }
        ));
    }

    #[test]
    fn test_replay_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();
        file.flush().unwrap();

        let err = replay_log(file.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("line 1"));
    }
}
