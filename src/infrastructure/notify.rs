use crate::domain::ports::{Notice, NotificationSink};
use async_trait::async_trait;
use tracing::info;

/// Default sink: notifications become log lines. The real delivery
/// channel (email) belongs to the external notification collaborator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(&self, notice: Notice) {
        info!(?notice, "notification");
    }
}
