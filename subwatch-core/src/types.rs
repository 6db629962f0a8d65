use serde::{Deserialize, Serialize};

/// A single submission as seen by the watcher. The `id` is the
/// subreddit-global Reddit post id and never changes for a given post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub url: String,
    pub created_utc: i64,
}

/// Remaining request budget reported by the post source.
///
/// `reset_at` is an epoch-second timestamp at which the budget refills.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub remaining: u32,
    pub reset_at: i64,
}

impl QuotaStatus {
    /// A quota that never throttles, used before the source has
    /// reported any headers.
    pub fn unlimited() -> Self {
        Self {
            remaining: u32::MAX,
            reset_at: 0,
        }
    }
}
