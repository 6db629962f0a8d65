use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use subwatch_core::SeenLedger;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Periodic housekeeping over the shared ledger: every sweep interval,
/// entries older than the expiration window are evicted and, if
/// anything was removed, the ledger is persisted. Runs alongside the
/// poll loop for the lifetime of the process.
pub struct ExpirySweeper {
    ledger: Arc<Mutex<SeenLedger>>,
    expire_after: Duration,
    sweep_interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        ledger: Arc<Mutex<SeenLedger>>,
        expire_after: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            expire_after,
            sweep_interval,
        }
    }

    /// One sweep pass at logical time `now`. Returns how many entries
    /// were evicted.
    pub async fn sweep_at(&self, now: i64) -> usize {
        let cutoff = now - self.expire_after.as_secs() as i64;

        let mut ledger = self.ledger.lock().await;
        let evicted = ledger.evict_older_than(cutoff);
        if evicted.is_empty() {
            debug!("Sweep found no expired ledger entries");
            return 0;
        }

        info!(
            "Evicted {} expired ledger entries, {} remain",
            evicted.len(),
            ledger.len()
        );
        if let Err(e) = ledger.persist() {
            warn!("Ledger persist after sweep failed: {}", e);
        }
        evicted.len()
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {}
                _ = shutdown.changed() => {
                    info!("Expiry sweeper stopping");
                    return;
                }
            }

            self.sweep_at(Utc::now().timestamp()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sweeper_with(
        dir: &tempfile::TempDir,
        expire_after: Duration,
    ) -> (ExpirySweeper, Arc<Mutex<SeenLedger>>) {
        let ledger = Arc::new(Mutex::new(SeenLedger::load(dir.path().join("ledger.json"))));
        let sweeper = ExpirySweeper::new(ledger.clone(), expire_after, Duration::from_secs(60));
        (sweeper, ledger)
    }

    #[tokio::test]
    async fn test_sweep_evicts_only_expired_entries() {
        let dir = tempdir().unwrap();
        let (sweeper, ledger) = sweeper_with(&dir, Duration::from_secs(3600));

        let now = 1_700_000_000;
        {
            let mut ledger = ledger.lock().await;
            ledger.record("stale", now - 3601);
            ledger.record("fresh", now - 3599);
        }

        let evicted = sweeper.sweep_at(now).await;
        assert_eq!(evicted, 1);

        let ledger = ledger.lock().await;
        assert!(!ledger.contains("stale"));
        assert!(ledger.contains("fresh"));
    }

    #[tokio::test]
    async fn test_sweep_persists_after_eviction() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let (sweeper, ledger) = sweeper_with(&dir, Duration::from_secs(3600));

        let now = 1_700_000_000;
        {
            let mut guard = ledger.lock().await;
            guard.record("stale", now - 7200);
            guard.record("fresh", now);
            guard.persist().unwrap();
        }

        sweeper.sweep_at(now).await;

        // The durable copy reflects the eviction
        let reloaded = SeenLedger::load(&path);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("fresh"));
    }

    #[tokio::test]
    async fn test_sweep_persist_failure_still_evicts() {
        let dir = tempdir().unwrap();
        // Persist will fail (missing parent directory); eviction from
        // the in-memory map must still go through
        let ledger = Arc::new(Mutex::new(SeenLedger::load(
            dir.path().join("missing").join("ledger.json"),
        )));
        let sweeper =
            ExpirySweeper::new(ledger.clone(), Duration::from_secs(3600), Duration::from_secs(60));

        let now = 1_700_000_000;
        ledger.lock().await.record("stale", now - 7200);

        let evicted = sweeper.sweep_at(now).await;
        assert_eq!(evicted, 1);
        assert!(!ledger.lock().await.contains("stale"));
    }

    #[tokio::test]
    async fn test_sweep_without_evictions_skips_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let (sweeper, ledger) = sweeper_with(&dir, Duration::from_secs(3600));

        let now = 1_700_000_000;
        ledger.lock().await.record("fresh", now);

        // Nothing expired: no evictions, and nothing written to disk
        let evicted = sweeper.sweep_at(now).await;
        assert_eq!(evicted, 0);
        assert!(!path.exists());
    }
}
