//! Deterministic `StatusNotifier` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use campaign_core::error::DomainError;
use campaign_core::event::Notification;
use campaign_core::notify::StatusNotifier;

/// A notifier that records every published notification.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    published: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recording notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published notifications.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusNotifier for RecordingNotifier {
    async fn publish(&self, notification: Notification) -> Result<(), DomainError> {
        self.published.lock().unwrap().push(notification);
        Ok(())
    }
}

/// A notifier that always fails. Useful for checking that delivery failures
/// do not undo committed work.
#[derive(Debug)]
pub struct FailingNotifier;

#[async_trait]
impl StatusNotifier for FailingNotifier {
    async fn publish(&self, _notification: Notification) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("broker unavailable".into()))
    }
}
