//! Post-commit event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every engine event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for routing on the receiving side.
    pub event_type: String,
    /// Character whose state changed.
    pub character_id: Uuid,
    /// Correlation ID of the command that produced the event.
    pub correlation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all engine events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> serde_json::Value;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;
}

/// Serialized form of an event handed to the notification layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Serialized payload.
    pub payload: serde_json::Value,
}

impl Notification {
    /// Builds the wire form of `event`.
    pub fn from_event(event: &dyn DomainEvent) -> Self {
        let mut metadata = event.metadata().clone();
        event.event_type().clone_into(&mut metadata.event_type);
        Self {
            metadata,
            payload: event.to_payload(),
        }
    }
}
