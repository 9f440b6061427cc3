//! Notification port.
//!
//! Delivery happens after the transaction commits and is fire-and-forget:
//! callers log a failed publish and move on.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::Notification;

/// Receives post-commit status notifications.
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    /// Publishes one notification.
    async fn publish(&self, notification: Notification) -> Result<(), DomainError>;
}

/// Notifier that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

#[async_trait]
impl StatusNotifier for NullNotifier {
    async fn publish(&self, _notification: Notification) -> Result<(), DomainError> {
        Ok(())
    }
}
