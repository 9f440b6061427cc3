//! Post-commit events of the effect engine.

use campaign_core::event::{DomainEvent, EventMetadata};
use campaign_core::model::ResourcePool;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Emitted after a committed operation changed a character's pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolsChanged {
    /// The affected character.
    pub character_id: Uuid,
    /// Every pool of the character after the change.
    pub pools: Vec<ResourcePool>,
}

/// Event payload variants of the effect engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatusEventKind {
    /// A character's pools changed.
    PoolsChanged(PoolsChanged),
}

/// Event envelope of the effect engine.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: StatusEventKind,
}

impl DomainEvent for StatusEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            StatusEventKind::PoolsChanged(_) => "effects.pools_changed",
        }
    }

    fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(&self.kind).unwrap_or_default()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
