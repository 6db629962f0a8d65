use crate::error::CoreError;
use crate::types::{Post, QuotaStatus};
use async_trait::async_trait;

/// Where new submissions come from.
///
/// `fetch_recent` returns up to `limit` of the newest submissions in
/// whatever order the backend provides; callers dedup against the
/// ledger per post, so ordering does not affect correctness.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Post>, CoreError>;

    /// Last-observed request budget. Implementations that have made no
    /// request yet report [`QuotaStatus::unlimited`].
    async fn quota(&self) -> QuotaStatus;
}

#[async_trait]
impl<T: PostSource + ?Sized> PostSource for std::sync::Arc<T> {
    async fn fetch_recent(&self, limit: u32) -> Result<Vec<Post>, CoreError> {
        (**self).fetch_recent(limit).await
    }

    async fn quota(&self) -> QuotaStatus {
        (**self).quota().await
    }
}
