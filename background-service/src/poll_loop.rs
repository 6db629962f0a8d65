use crate::backoff::BackoffPolicy;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use subwatch_core::{CoreError, KeywordMatcher, NotificationSink, PostSource, QuotaStatus, SeenLedger};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

// Remaining-request level at which the loop stops trusting the poll
// interval and waits out the quota window instead.
const QUOTA_LOW_WATER: u32 = 5;
const QUOTA_SAFETY_MARGIN: Duration = Duration::from_secs(2);

/// How long to pause before the next fetch when the source's quota is
/// nearly exhausted. Checked post-batch, pre-sleep. Returns `None` when
/// the budget is comfortable.
pub fn quota_backoff(quota: QuotaStatus, now: i64) -> Option<Duration> {
    if quota.remaining > QUOTA_LOW_WATER {
        return None;
    }
    let wait = (quota.reset_at - now).max(0) as u64;
    Some(Duration::from_secs(wait) + QUOTA_SAFETY_MARGIN)
}

/// Result of one fetch-filter-notify cycle.
#[derive(Debug)]
pub struct CycleOutcome {
    pub fetched: usize,
    pub notified: usize,
    pub quota_pause: Option<Duration>,
}

/// The fetch → filter → notify → rate-check → sleep cycle.
///
/// Candidates are posts that match the keyword set and are absent from
/// the ledger. A post is recorded only after its notification was
/// delivered, so a failed send leaves it eligible for retry on a later
/// cycle. Fetch failures never escape `run`; they back off and retry.
pub struct PollLoop<S, N> {
    source: S,
    sink: N,
    matcher: KeywordMatcher,
    ledger: Arc<Mutex<SeenLedger>>,
    fetch_limit: u32,
    poll_interval: Duration,
    backoff: BackoffPolicy,
}

impl<S: PostSource, N: NotificationSink> PollLoop<S, N> {
    pub fn new(
        source: S,
        sink: N,
        matcher: KeywordMatcher,
        ledger: Arc<Mutex<SeenLedger>>,
        fetch_limit: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            source,
            sink,
            matcher,
            ledger,
            fetch_limit,
            poll_interval,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Run one cycle. A fetch error propagates to the caller (which
    /// backs off); per-candidate send errors are contained here.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CoreError> {
        let posts = self.source.fetch_recent(self.fetch_limit).await?;
        let fetched = posts.len();
        let mut notified = 0;

        for post in posts {
            if self.ledger.lock().await.contains(&post.id) {
                debug!("Skipping already-notified post {}", post.id);
                continue;
            }
            if !self.matcher.matches(&post.title) {
                continue;
            }

            let message = format!("New post found: {}\n{}", post.title, post.url);
            match self.sink.send(&message).await {
                Ok(()) => {
                    info!("Sent notification for: {}", post.title);
                    let mut ledger = self.ledger.lock().await;
                    ledger.record(&post.id, Utc::now().timestamp());
                    if let Err(e) = ledger.persist() {
                        // In-memory state stays authoritative; the next
                        // successful persist picks this entry up.
                        warn!("Ledger persist failed, retrying on next mutation: {}", e);
                    }
                    notified += 1;
                }
                Err(e) => {
                    warn!(
                        "Notification failed for post {}, retrying next cycle: {}",
                        post.id, e
                    );
                }
            }
        }

        let quota = self.source.quota().await;
        let quota_pause = quota_backoff(quota, Utc::now().timestamp());
        if let Some(pause) = quota_pause {
            warn!(
                "Source quota nearly exhausted ({} remaining), pausing {:?}",
                quota.remaining, pause
            );
        }

        Ok(CycleOutcome {
            fetched,
            notified,
            quota_pause,
        })
    }

    /// Drive cycles until the shutdown signal flips.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut consecutive_failures = 0u32;

        loop {
            let sleep_for = match self.run_cycle().await {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    debug!(
                        "Cycle complete: {} fetched, {} notified",
                        outcome.fetched, outcome.notified
                    );
                    match outcome.quota_pause {
                        Some(pause) => pause.max(self.poll_interval),
                        None => self.poll_interval,
                    }
                }
                Err(e) => {
                    consecutive_failures += 1;
                    let delay = self.backoff.delay(consecutive_failures);
                    warn!(
                        "Poll cycle failed ({} consecutive), retrying in {:?}: {}",
                        consecutive_failures, delay, e
                    );
                    delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = shutdown.changed() => {
                    info!("Poll loop stopping");
                    return;
                }
            }
        }
    }
}
