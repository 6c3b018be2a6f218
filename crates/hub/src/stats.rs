//! Usage counters and feedback log, persisted as JSON.
//!
//! Neither file matters for correctness: loads tolerate missing or
//! damaged files and writes are best-effort, so persistence trouble never
//! takes the hub down.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Counters shown at `GET /api/stats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageStats {
    /// Devices that have ever created or joined a session.
    pub total_users: u64,
    /// Sessions ever created.
    pub total_sessions: u64,
}

/// Persistent usage counters.
pub struct StatsStore {
    path: PathBuf,
    inner: Mutex<UsageStats>,
}

impl StatsStore {
    /// Load counters from `path`, starting from zero when the file is
    /// missing or unreadable.
    pub fn load(path: PathBuf) -> Self {
        let stats = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(stats) => stats,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "stats file damaged, starting fresh");
                    UsageStats::default()
                }
            },
            Err(_) => UsageStats::default(),
        };

        Self {
            path,
            inner: Mutex::new(stats),
        }
    }

    /// Count a created session (and its creator as a user).
    pub fn record_session_created(&self) {
        self.update(|stats| {
            stats.total_sessions += 1;
            stats.total_users += 1;
        });
    }

    /// Count a device joining an existing session.
    pub fn record_session_joined(&self) {
        self.update(|stats| {
            stats.total_users += 1;
        });
    }

    /// Current counter values.
    pub fn snapshot(&self) -> UsageStats {
        *self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut UsageStats)) {
        let snapshot = {
            let mut stats = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut stats);
            *stats
        };

        if let Err(e) = persist_json(&self.path, &snapshot) {
            warn!(path = %self.path.display(), error = %e, "failed to persist stats");
        }
    }
}

/// A single feedback submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    /// Star rating, 1 to 5. Range-checked by the API layer.
    pub rating: u8,
    /// Free-form comment; may be empty.
    pub feedback: String,
    /// Submission time, milliseconds since the Unix epoch.
    pub at: u64,
}

/// Append-only feedback log backed by a JSON array on disk.
pub struct FeedbackLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FeedbackLog {
    /// Create a log handle; the file is created lazily on first append.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    /// Append one entry, stamped with the current time.
    pub fn append(&self, rating: u8, feedback: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries: Vec<FeedbackEntry> = match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %self.path.display(), error = %e, "feedback log damaged, starting fresh");
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };

        entries.push(FeedbackEntry {
            rating,
            feedback: feedback.to_string(),
            at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        });

        persist_json(&self.path, &entries)
    }

    /// Every recorded entry, oldest first.
    pub fn entries(&self) -> Result<Vec<FeedbackEntry>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(_) => Ok(Vec::new()),
        }
    }
}

fn persist_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stats_start_from_zero() {
        let dir = tempdir().unwrap();
        let store = StatsStore::load(dir.path().join("stats.json"));
        assert_eq!(store.snapshot(), UsageStats::default());
    }

    #[test]
    fn test_stats_counters_and_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let store = StatsStore::load(path.clone());
        store.record_session_created();
        store.record_session_joined();
        store.record_session_joined();

        let stats = store.snapshot();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.total_users, 3);

        // A fresh store picks up the persisted counters.
        let reloaded = StatsStore::load(path);
        assert_eq!(reloaded.snapshot(), stats);
    }

    #[test]
    fn test_stats_wire_format_is_camel_case() {
        let json = serde_json::to_string(&UsageStats {
            total_users: 7,
            total_sessions: 3,
        })
        .unwrap();
        assert!(json.contains("\"totalUsers\":7"));
        assert!(json.contains("\"totalSessions\":3"));
    }

    #[test]
    fn test_damaged_stats_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stats.json");
        fs::write(&path, "{definitely not json").unwrap();

        let store = StatsStore::load(path);
        assert_eq!(store.snapshot(), UsageStats::default());
    }

    #[test]
    fn test_feedback_appends_in_order() {
        let dir = tempdir().unwrap();
        let log = FeedbackLog::new(dir.path().join("feedback.json"));

        log.append(5, "great").unwrap();
        log.append(2, "meh").unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rating, 5);
        assert_eq!(entries[0].feedback, "great");
        assert_eq!(entries[1].rating, 2);
        assert!(entries[0].at <= entries[1].at);
    }

    #[test]
    fn test_feedback_empty_log_reads_as_empty() {
        let dir = tempdir().unwrap();
        let log = FeedbackLog::new(dir.path().join("feedback.json"));
        assert!(log.entries().unwrap().is_empty());
    }

    #[test]
    fn test_feedback_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let log = FeedbackLog::new(dir.path().join("nested").join("deep").join("feedback.json"));
        log.append(4, "nested ok").unwrap();
        assert_eq!(log.entries().unwrap().len(), 1);
    }
}
