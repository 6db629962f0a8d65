pub mod backoff;
pub mod poll_loop;
pub mod sweeper;

pub use backoff::BackoffPolicy;
pub use poll_loop::{quota_backoff, CycleOutcome, PollLoop};
pub use sweeper::ExpirySweeper;

use std::sync::Arc;
use std::time::Duration;
use subwatch_core::{KeywordMatcher, NotificationSink, PostSource, SeenLedger};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Durations and sizes the service needs from the wider configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub fetch_limit: u32,
    pub poll_interval: Duration,
    pub expire_after: Duration,
    pub sweep_interval: Duration,
}

/// Supervises the poll loop and the expiry sweeper as two independent
/// tokio tasks sharing one ledger. Shutdown flips a watch channel, lets
/// both tasks finish their current operation, then persists the ledger
/// one final time.
pub struct WatchService {
    ledger: Arc<Mutex<SeenLedger>>,
    shutdown_tx: watch::Sender<bool>,
    poll_handle: JoinHandle<()>,
    sweep_handle: JoinHandle<()>,
}

impl WatchService {
    pub fn start<S, N>(
        source: S,
        sink: N,
        matcher: KeywordMatcher,
        ledger: SeenLedger,
        config: ServiceConfig,
    ) -> Self
    where
        S: PostSource + 'static,
        N: NotificationSink + 'static,
    {
        let ledger = Arc::new(Mutex::new(ledger));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poll_loop = PollLoop::new(
            source,
            sink,
            matcher,
            ledger.clone(),
            config.fetch_limit,
            config.poll_interval,
        );
        let sweeper = ExpirySweeper::new(ledger.clone(), config.expire_after, config.sweep_interval);

        info!(
            "Starting watch service (poll every {:?}, sweep every {:?})",
            config.poll_interval, config.sweep_interval
        );
        let poll_handle = tokio::spawn(poll_loop.run(shutdown_rx.clone()));
        let sweep_handle = tokio::spawn(sweeper.run(shutdown_rx));

        Self {
            ledger,
            shutdown_tx,
            poll_handle,
            sweep_handle,
        }
    }

    /// Signal both tasks, wait for them to stop, persist the ledger.
    pub async fn shutdown(self) {
        info!("Shutting down watch service");
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.poll_handle.await {
            error!("Poll loop task panicked: {}", e);
        }
        if let Err(e) = self.sweep_handle.await {
            error!("Sweeper task panicked: {}", e);
        }

        // Both tasks have stopped touching the ledger by now
        let ledger = self.ledger.lock().await;
        match ledger.persist() {
            Ok(()) => info!("Final ledger persist complete ({} entries)", ledger.len()),
            Err(e) => error!("Final ledger persist failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use subwatch_core::{CoreError, Post, QuotaStatus};
    use tempfile::tempdir;

    struct EmptySource;

    #[async_trait]
    impl PostSource for EmptySource {
        async fn fetch_recent(&self, _limit: u32) -> Result<Vec<Post>, CoreError> {
            Ok(Vec::new())
        }

        async fn quota(&self) -> QuotaStatus {
            QuotaStatus::unlimited()
        }
    }

    struct NullSink;

    #[async_trait]
    impl NotificationSink for NullSink {
        async fn send(&self, _text: &str) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_persists_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut ledger = SeenLedger::load(&path);
        ledger.record("p1", 1_700_000_000);

        let matcher = KeywordMatcher::new(&["[H]".to_string()]).unwrap();
        let service = WatchService::start(
            EmptySource,
            NullSink,
            matcher,
            ledger,
            ServiceConfig {
                fetch_limit: 10,
                poll_interval: Duration::from_secs(60),
                expire_after: Duration::from_secs(3600),
                sweep_interval: Duration::from_secs(60),
            },
        );

        service.shutdown().await;

        let reloaded = SeenLedger::load(&path);
        assert!(reloaded.contains("p1"));
    }
}
