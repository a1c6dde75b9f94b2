//! Append-only activity log
//!
//! Each entry is one JSON line, flushed as it is written. The log is shared
//! by worker threads, so appends are serialized through a mutex.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{BillPayError, BillPayResult};

use super::entry::ActivityEntry;

/// Writes activity entries to the log file (JSONL)
pub struct ActivityLogger {
    log_path: PathBuf,
    write_lock: Mutex<()>,
}

impl ActivityLogger {
    pub fn new(log_path: PathBuf) -> Self {
        Self {
            log_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one entry
    pub fn log(&self, entry: &ActivityEntry) -> BillPayResult<()> {
        self.log_batch(std::slice::from_ref(entry))
    }

    /// Append several entries with a single flush
    pub fn log_batch(&self, entries: &[ActivityEntry]) -> BillPayResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BillPayError::Io("Activity log lock poisoned".into()))?;

        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| BillPayError::Io(format!("Failed to create log directory: {}", e)))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| BillPayError::Io(format!("Failed to open activity log: {}", e)))?;

        for entry in entries {
            let json = serde_json::to_string(entry).map_err(|e| {
                BillPayError::Json(format!("Failed to serialize activity entry: {}", e))
            })?;
            writeln!(file, "{}", json)
                .map_err(|e| BillPayError::Io(format!("Failed to write activity entry: {}", e)))?;
        }

        file.flush()
            .map_err(|e| BillPayError::Io(format!("Failed to flush activity log: {}", e)))
    }

    /// Record an entry, downgrading write failures to a warning
    ///
    /// A broken log must not fail the payment it describes.
    pub fn record(&self, entry: &ActivityEntry) {
        if let Err(e) = self.log(entry) {
            tracing::warn!(error = %e, action = %entry.action, "activity log write failed");
        }
    }

    /// Read all entries, oldest first
    pub fn read_all(&self) -> BillPayResult<Vec<ActivityEntry>> {
        if !self.log_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.log_path)
            .map_err(|e| BillPayError::Io(format!("Failed to open activity log: {}", e)))?;

        let mut entries = Vec::new();
        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| {
                BillPayError::Io(format!("Failed to read activity log line {}: {}", line_num + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: ActivityEntry = serde_json::from_str(&line).map_err(|e| {
                BillPayError::Json(format!(
                    "Failed to parse activity entry at line {}: {}",
                    line_num + 1,
                    e
                ))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// The most recent `count` entries
    pub fn read_recent(&self, count: usize) -> BillPayResult<Vec<ActivityEntry>> {
        let mut all = self.read_all()?;
        let start = all.len().saturating_sub(count);
        Ok(all.split_off(start))
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::Action;
    use crate::models::ProviderId;
    use tempfile::TempDir;

    fn create_test_logger() -> (ActivityLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let logger = ActivityLogger::new(temp_dir.path().join("activity.log"));
        (logger, temp_dir)
    }

    fn entry(subject: &str) -> ActivityEntry {
        ActivityEntry::success(Action::Query, Some(ProviderId::Momo), subject, "Succeeded")
    }

    #[test]
    fn test_log_and_read() {
        let (logger, _temp) = create_test_logger();
        logger.log(&entry("PAYOO_1")).unwrap();

        let entries = logger.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, Action::Query);
        assert_eq!(entries[0].subject, "PAYOO_1");
    }

    #[test]
    fn test_read_recent() {
        let (logger, _temp) = create_test_logger();
        let batch: Vec<_> = (0..10).map(|i| entry(&format!("PAYOO_{}", i))).collect();
        logger.log_batch(&batch).unwrap();

        let recent = logger.read_recent(3).unwrap();
        let subjects: Vec<_> = recent.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["PAYOO_7", "PAYOO_8", "PAYOO_9"]);
    }

    #[test]
    fn test_empty_log() {
        let (logger, _temp) = create_test_logger();
        assert!(logger.read_all().unwrap().is_empty());
        assert!(logger.read_recent(5).unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_appends_stay_line_delimited() {
        let (logger, _temp) = create_test_logger();
        let logger = std::sync::Arc::new(logger);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let logger = logger.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        logger.log(&entry(&format!("T{}_{}", t, i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(logger.read_all().unwrap().len(), 100);
    }

    #[test]
    fn test_survives_restart() {
        let (logger, temp) = create_test_logger();
        logger.log(&entry("PAYOO_1")).unwrap();

        let reopened = ActivityLogger::new(temp.path().join("activity.log"));
        assert_eq!(reopened.read_all().unwrap().len(), 1);
    }
}
