//! Notifier that writes status notifications to the tracing pipeline.

use async_trait::async_trait;
use campaign_core::error::DomainError;
use campaign_core::event::Notification;
use campaign_core::notify::StatusNotifier;
use tracing::info;

/// Logs each notification at `info` level. Used when no broker is wired.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl StatusNotifier for LoggingNotifier {
    async fn publish(&self, notification: Notification) -> Result<(), DomainError> {
        let metadata = &notification.metadata;
        info!(
            event_id = %metadata.event_id,
            event_type = %metadata.event_type,
            character_id = %metadata.character_id,
            correlation_id = %metadata.correlation_id,
            payload = %notification.payload,
            "Status notification"
        );
        Ok(())
    }
}
