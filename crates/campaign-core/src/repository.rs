//! Storage ports for the effect engine.
//!
//! Every engine operation runs inside one [`EffectTransaction`]. Dropping a
//! transaction without calling [`EffectTransaction::commit`] discards all of
//! its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::model::{
    AppliedEffectInstance, Archetype, AttributeDefinition, CharacterAttributeValue,
    CharacterProfile, EffectDefinition, InventoryEntry, PoolWrite, ResourcePool, SourceEffectLink,
    SourceKind,
};

/// Which live instances a bulk turn advance touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnScope {
    /// Every live instance.
    All,
    /// Live instances of one character.
    Character(Uuid),
}

impl TurnScope {
    /// Returns the character filter, if any.
    #[must_use]
    pub fn character_id(self) -> Option<Uuid> {
        match self {
            Self::All => None,
            Self::Character(id) => Some(id),
        }
    }
}

/// Opens transactions against the backing store.
#[async_trait]
pub trait EffectStore: Send + Sync {
    /// Begins a new transaction.
    async fn begin(&self) -> Result<Box<dyn EffectTransaction>, DomainError>;
}

/// One atomic unit of reads and writes.
#[async_trait]
pub trait EffectTransaction: Send {
    // --- catalog (read-only) ---

    /// Loads a non-deleted effect with its modifiers.
    async fn load_effect(&mut self, effect_id: Uuid)
    -> Result<Option<EffectDefinition>, DomainError>;

    /// Loads the non-deleted link between a source and an effect.
    async fn load_source_link(
        &mut self,
        source_kind: SourceKind,
        source_id: Uuid,
        effect_id: Uuid,
    ) -> Result<Option<SourceEffectLink>, DomainError>;

    /// Loads every non-deleted effect link of a source.
    async fn load_source_links(
        &mut self,
        source_kind: SourceKind,
        source_id: Uuid,
    ) -> Result<Vec<SourceEffectLink>, DomainError>;

    /// Loads the attribute catalog.
    async fn load_attribute_catalog(&mut self) -> Result<Vec<AttributeDefinition>, DomainError>;

    /// Loads a character header.
    async fn load_character(
        &mut self,
        character_id: Uuid,
    ) -> Result<Option<CharacterProfile>, DomainError>;

    /// Loads an archetype.
    async fn load_archetype(&mut self, archetype_id: Uuid)
    -> Result<Option<Archetype>, DomainError>;

    // --- character sheet ---

    /// Loads and locks a character's resource pools.
    async fn load_pools(&mut self, character_id: Uuid) -> Result<Vec<ResourcePool>, DomainError>;

    /// Persists the changed fields of one pool.
    async fn write_pool(&mut self, write: &PoolWrite) -> Result<(), DomainError>;

    /// Loads a character's attribute rows.
    async fn load_character_attributes(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<CharacterAttributeValue>, DomainError>;

    /// Adds `delta` to a row's `equipment_delta`, creating the row if absent.
    async fn add_equipment_delta(
        &mut self,
        character_id: Uuid,
        attribute_id: Uuid,
        delta: i32,
    ) -> Result<(), DomainError>;

    // --- applied effects ---

    /// Finds and locks the newest live instance of the tuple whose window
    /// still covers `current_turn`.
    async fn find_active_instance(
        &mut self,
        character_id: Uuid,
        effect_id: Uuid,
        source_kind: SourceKind,
        current_turn: i32,
    ) -> Result<Option<AppliedEffectInstance>, DomainError>;

    /// Retires live instances of the tuple whose window ended before
    /// `current_turn`. Returns the number retired.
    async fn retire_stale_instances(
        &mut self,
        character_id: Uuid,
        effect_id: Uuid,
        source_kind: SourceKind,
        current_turn: i32,
        retired_at: DateTime<Utc>,
    ) -> Result<u64, DomainError>;

    /// Inserts a new instance.
    ///
    /// Returns `DomainError::ConcurrencyConflict` when a live instance of the
    /// same tuple already exists.
    async fn insert_instance(&mut self, instance: &AppliedEffectInstance)
    -> Result<(), DomainError>;

    /// Overwrites an existing instance.
    async fn update_instance(&mut self, instance: &AppliedEffectInstance)
    -> Result<(), DomainError>;

    /// Loads and locks a live instance by id.
    async fn load_live_instance(
        &mut self,
        instance_id: Uuid,
    ) -> Result<Option<AppliedEffectInstance>, DomainError>;

    /// Lists a character's live instances ordered by expiry turn then id.
    async fn list_live_instances(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<AppliedEffectInstance>, DomainError>;

    /// Decrements `duration_remaining` of live instances with a positive
    /// remaining duration. Returns the number updated.
    async fn decrement_durations(&mut self, scope: TurnScope) -> Result<u64, DomainError>;

    /// Retires live instances with no remaining duration. Returns the number
    /// retired.
    async fn retire_exhausted(
        &mut self,
        scope: TurnScope,
        retired_at: DateTime<Utc>,
    ) -> Result<u64, DomainError>;

    // --- inventory ---

    /// Loads and locks a live inventory entry.
    async fn load_inventory_entry(
        &mut self,
        entry_id: Uuid,
    ) -> Result<Option<InventoryEntry>, DomainError>;

    /// Lists a character's live inventory entries in insertion order.
    async fn list_inventory(&mut self, character_id: Uuid)
    -> Result<Vec<InventoryEntry>, DomainError>;

    /// Persists `equipped`, `quantity` and `deleted_at` of an entry.
    async fn save_inventory_entry(&mut self, entry: &InventoryEntry) -> Result<(), DomainError>;

    /// Commits every write made through this transaction.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
