//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

use crate::model::SourceKind;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced effect definition does not exist or was soft-deleted.
    #[error("effect not found: {0}")]
    EffectNotFound(Uuid),

    /// An applied effect instance is absent or already retired.
    #[error("applied effect {0} not found or already expired")]
    InstanceNotActive(Uuid),

    /// A referenced character does not exist.
    #[error("character not found: {0}")]
    CharacterNotFound(Uuid),

    /// A referenced inventory entry does not exist or was soft-deleted.
    #[error("inventory entry not found: {0}")]
    InventoryEntryNotFound(Uuid),

    /// A dynamic modifier could not be mapped to a concrete pool or attribute.
    #[error("unresolved dynamic target for effect {effect_id} (source kind {source_kind}): {reason}")]
    UnresolvedDynamicTarget {
        /// The effect carrying the dynamic modifier.
        effect_id: Uuid,
        /// The kind of source that triggered the application.
        source_kind: SourceKind,
        /// What was missing or malformed.
        reason: String,
    },

    /// Two live equipped entries would occupy the same slot.
    #[error("slot conflict for character {character_id}: slot '{slot}' is already occupied")]
    SlotConflict {
        /// The character whose equipment conflicts.
        character_id: Uuid,
        /// The contested slot.
        slot: String,
    },

    /// A concurrent caller created the same live applied effect first.
    #[error("concurrency conflict: effect {effect_id} ({source_kind}) is already live on character {character_id}")]
    ConcurrencyConflict {
        /// The character targeted by both callers.
        character_id: Uuid,
        /// The effect both callers applied.
        effect_id: Uuid,
        /// The source kind of the application.
        source_kind: SourceKind,
    },

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for the not-found family of errors.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EffectNotFound(_)
                | Self::InstanceNotActive(_)
                | Self::CharacterNotFound(_)
                | Self::InventoryEntryNotFound(_)
        )
    }
}
