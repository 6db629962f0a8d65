use crate::error::CoreError;
use async_trait::async_trait;

/// Where match notifications go. A failed send is recoverable: the
/// caller leaves the post unrecorded and retries it on a later cycle.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), CoreError>;
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    async fn send(&self, text: &str) -> Result<(), CoreError> {
        (**self).send(text).await
    }
}
