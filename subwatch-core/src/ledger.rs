use crate::error::LedgerError;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable record of posts that have already been notified.
///
/// Maps a post id to the epoch-second timestamp at which it was first
/// matched and sent. `contains` only checks presence; stale entries are
/// removed by the sweeper via `evict_older_than`, never inline, so the
/// per-poll suppression check stays a plain map lookup.
#[derive(Debug)]
pub struct SeenLedger {
    entries: HashMap<String, i64>,
    path: PathBuf,
}

impl SeenLedger {
    /// Load the ledger from `path`. A missing, unreadable, or corrupt
    /// file falls back to an empty ledger with a warning; losing dedup
    /// history is recoverable, failing to start is not.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::try_load(&path) {
            Ok(entries) => {
                debug!("Loaded {} ledger entries from {}", entries.len(), path.display());
                entries
            }
            Err(e) => {
                warn!("Starting with an empty ledger: {}", e);
                HashMap::new()
            }
        };

        Self { entries, path }
    }

    fn try_load(path: &Path) -> Result<HashMap<String, i64>, LedgerError> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let bytes = fs::read(path).map_err(|source| LedgerError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

        serde_json::from_slice(&bytes).map_err(|source| LedgerError::ParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn contains(&self, post_id: &str) -> bool {
        self.entries.contains_key(post_id)
    }

    /// Insert or overwrite the entry for `post_id`. Idempotent.
    pub fn record(&mut self, post_id: &str, first_seen_at: i64) {
        self.entries.insert(post_id.to_string(), first_seen_at);
    }

    /// Remove every entry first seen before `cutoff`, returning the
    /// evicted post ids.
    pub fn evict_older_than(&mut self, cutoff: i64) -> Vec<String> {
        let evicted: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, &first_seen_at)| first_seen_at < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &evicted {
            self.entries.remove(id);
        }

        evicted
    }

    /// Write the ledger to disk. The file is written to a temporary
    /// sibling and renamed into place so a crash mid-write never leaves
    /// a truncated, unparseable store behind. Idempotent.
    pub fn persist(&self) -> Result<(), LedgerError> {
        let bytes = serde_json::to_vec_pretty(&sorted_entries(&self.entries))
            .expect("ledger map serializes to JSON");

        let tmp_path = self.path.with_extension("json.tmp");
        let write_failed = |source| LedgerError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = File::create(&tmp_path).map_err(&write_failed)?;
        file.write_all(&bytes).map_err(&write_failed)?;
        file.sync_all().map_err(&write_failed)?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(&write_failed)?;
        debug!("Persisted {} ledger entries to {}", self.entries.len(), self.path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Keyed by post id so repeated persists of the same entries produce
// byte-identical files.
fn sorted_entries(entries: &HashMap<String, i64>) -> std::collections::BTreeMap<&str, i64> {
    entries.iter().map(|(id, &ts)| (id.as_str(), ts)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ledger_in(dir: &tempfile::TempDir) -> SeenLedger {
        SeenLedger::load(dir.path().join("ledger.json"))
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let ledger = ledger_in(&dir);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_record_and_contains() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);

        assert!(!ledger.contains("p1"));
        ledger.record("p1", 1_700_000_000);
        assert!(ledger.contains("p1"));

        // Recording again is idempotent
        ledger.record("p1", 1_700_000_001);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut ledger = SeenLedger::load(&path);
        ledger.record("p1", 1_700_000_000);
        ledger.record("p2", 1_700_000_060);
        ledger.persist().unwrap();

        let reloaded = SeenLedger::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("p1"));
        assert!(reloaded.contains("p2"));
    }

    #[test]
    fn test_persist_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut ledger = SeenLedger::load(&path);
        ledger.record("p1", 1_700_000_000);

        ledger.persist().unwrap();
        let first = fs::read(&path).unwrap();
        ledger.persist().unwrap();
        let second = fs::read(&path).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_persist_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);
        ledger.record("p1", 1_700_000_000);
        ledger.persist().unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["ledger.json".to_string()]);
    }

    #[test]
    fn test_evict_older_than_boundary() {
        let dir = tempdir().unwrap();
        let mut ledger = ledger_in(&dir);

        let now = 1_700_000_000;
        let window = 3600;
        ledger.record("stale", now - window - 1);
        ledger.record("fresh", now - window + 1);
        ledger.record("exact", now - window);

        let evicted = ledger.evict_older_than(now - window);
        assert_eq!(evicted, vec!["stale".to_string()]);
        assert!(!ledger.contains("stale"));
        assert!(ledger.contains("fresh"));
        // Entry exactly at the cutoff is kept (strictly-older semantics)
        assert!(ledger.contains("exact"));
    }

    #[test]
    fn test_persist_to_unwritable_path_errors() {
        let dir = tempdir().unwrap();
        // Parent directory does not exist, so the temp file cannot be
        // created; the error is recoverable and the map stays intact
        let mut ledger = SeenLedger::load(dir.path().join("missing").join("ledger.json"));
        ledger.record("p1", 1_700_000_000);

        let result = ledger.persist();
        assert!(matches!(result, Err(LedgerError::WriteFailed { .. })));
        assert!(ledger.contains("p1"));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, b"{ not json").unwrap();

        let ledger = SeenLedger::load(&path);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_persist_after_eviction_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut ledger = SeenLedger::load(&path);
        ledger.record("old", 100);
        ledger.record("new", 200);
        ledger.evict_older_than(150);
        ledger.persist().unwrap();

        let reloaded = SeenLedger::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("new"));
    }
}
