//! In-memory `EffectStore` implementations for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use campaign_core::error::DomainError;
use campaign_core::model::{
    AppliedEffectInstance, Archetype, AttributeDefinition, CharacterAttributeValue,
    CharacterProfile, EffectDefinition, InventoryEntry, PoolWrite, ResourcePool, SourceEffectLink,
    SourceKind,
};
use campaign_core::repository::{EffectStore, EffectTransaction, TurnScope};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Every table the engine reads or writes.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    /// Effect catalog, modifiers inlined.
    pub effects: Vec<EffectDefinition>,
    /// Item and ability effect links.
    pub source_links: Vec<SourceEffectLink>,
    /// Attribute catalog.
    pub attributes: Vec<AttributeDefinition>,
    /// Character headers.
    pub characters: Vec<CharacterProfile>,
    /// Archetypes.
    pub archetypes: Vec<Archetype>,
    /// Resource pools of every character.
    pub pools: Vec<ResourcePool>,
    /// Attribute rows of every character.
    pub character_attributes: Vec<CharacterAttributeValue>,
    /// Applied effect instances, retired ones included.
    pub instances: Vec<AppliedEffectInstance>,
    /// Inventory entries, soft-deleted ones included.
    pub inventory: Vec<InventoryEntry>,
}

/// An `EffectStore` over a shared [`StoreState`].
///
/// Transactions take an owned lock on the state and work on a copy; commit
/// swaps the copy in, drop discards it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEffectStore {
    state: Arc<Mutex<StoreState>>,
    commits: Arc<AtomicUsize>,
}

impl InMemoryEffectStore {
    /// Create a store seeded with `state`.
    #[must_use]
    pub fn new(state: StoreState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            commits: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns a copy of the committed state.
    pub async fn snapshot(&self) -> StoreState {
        self.state.lock().await.clone()
    }

    /// Returns how many transactions committed.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EffectStore for InMemoryEffectStore {
    async fn begin(&self) -> Result<Box<dyn EffectTransaction>, DomainError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            commits: Arc::clone(&self.commits),
        }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
    commits: Arc<AtomicUsize>,
}

fn in_scope(instance: &AppliedEffectInstance, scope: TurnScope) -> bool {
    instance.is_live() && scope.character_id().is_none_or(|id| id == instance.character_id)
}

#[async_trait]
impl EffectTransaction for InMemoryTransaction {
    async fn load_effect(
        &mut self,
        effect_id: Uuid,
    ) -> Result<Option<EffectDefinition>, DomainError> {
        Ok(self
            .working
            .effects
            .iter()
            .find(|e| e.id == effect_id && e.deleted_at.is_none())
            .cloned())
    }

    async fn load_source_link(
        &mut self,
        source_kind: SourceKind,
        source_id: Uuid,
        effect_id: Uuid,
    ) -> Result<Option<SourceEffectLink>, DomainError> {
        Ok(self
            .working
            .source_links
            .iter()
            .find(|l| {
                l.source_kind == source_kind
                    && l.source_id == source_id
                    && l.effect_id == effect_id
                    && l.deleted_at.is_none()
            })
            .cloned())
    }

    async fn load_source_links(
        &mut self,
        source_kind: SourceKind,
        source_id: Uuid,
    ) -> Result<Vec<SourceEffectLink>, DomainError> {
        Ok(self
            .working
            .source_links
            .iter()
            .filter(|l| {
                l.source_kind == source_kind && l.source_id == source_id && l.deleted_at.is_none()
            })
            .cloned()
            .collect())
    }

    async fn load_attribute_catalog(&mut self) -> Result<Vec<AttributeDefinition>, DomainError> {
        Ok(self.working.attributes.clone())
    }

    async fn load_character(
        &mut self,
        character_id: Uuid,
    ) -> Result<Option<CharacterProfile>, DomainError> {
        Ok(self
            .working
            .characters
            .iter()
            .find(|c| c.id == character_id)
            .cloned())
    }

    async fn load_archetype(
        &mut self,
        archetype_id: Uuid,
    ) -> Result<Option<Archetype>, DomainError> {
        Ok(self
            .working
            .archetypes
            .iter()
            .find(|a| a.id == archetype_id)
            .cloned())
    }

    async fn load_pools(&mut self, character_id: Uuid) -> Result<Vec<ResourcePool>, DomainError> {
        Ok(self
            .working
            .pools
            .iter()
            .filter(|p| p.character_id == character_id)
            .cloned()
            .collect())
    }

    async fn write_pool(&mut self, write: &PoolWrite) -> Result<(), DomainError> {
        let pool = self
            .working
            .pools
            .iter_mut()
            .find(|p| p.id == write.pool_id)
            .ok_or_else(|| {
                DomainError::Infrastructure(format!("pool {} does not exist", write.pool_id))
            })?;
        write.apply_to(pool);
        Ok(())
    }

    async fn load_character_attributes(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<CharacterAttributeValue>, DomainError> {
        Ok(self
            .working
            .character_attributes
            .iter()
            .filter(|a| a.character_id == character_id)
            .cloned()
            .collect())
    }

    async fn add_equipment_delta(
        &mut self,
        character_id: Uuid,
        attribute_id: Uuid,
        delta: i32,
    ) -> Result<(), DomainError> {
        match self
            .working
            .character_attributes
            .iter_mut()
            .find(|a| a.character_id == character_id && a.attribute_id == attribute_id)
        {
            Some(row) => row.equipment_delta += delta,
            None => self
                .working
                .character_attributes
                .push(CharacterAttributeValue {
                    character_id,
                    attribute_id,
                    base: 0,
                    equipment_delta: delta,
                    extra: 0,
                }),
        }
        Ok(())
    }

    async fn find_active_instance(
        &mut self,
        character_id: Uuid,
        effect_id: Uuid,
        source_kind: SourceKind,
        current_turn: i32,
    ) -> Result<Option<AppliedEffectInstance>, DomainError> {
        Ok(self
            .working
            .instances
            .iter()
            .rev()
            .find(|i| {
                i.is_live()
                    && i.character_id == character_id
                    && i.effect_id == effect_id
                    && i.source_kind == source_kind
                    && i.expires_at_turn >= current_turn
            })
            .cloned())
    }

    async fn retire_stale_instances(
        &mut self,
        character_id: Uuid,
        effect_id: Uuid,
        source_kind: SourceKind,
        current_turn: i32,
        retired_at: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let mut retired = 0;
        for instance in &mut self.working.instances {
            if instance.is_live()
                && instance.character_id == character_id
                && instance.effect_id == effect_id
                && instance.source_kind == source_kind
                && instance.expires_at_turn < current_turn
            {
                instance.deleted_at = Some(retired_at);
                retired += 1;
            }
        }
        Ok(retired)
    }

    async fn insert_instance(
        &mut self,
        instance: &AppliedEffectInstance,
    ) -> Result<(), DomainError> {
        let duplicate = self.working.instances.iter().any(|i| {
            i.is_live()
                && i.character_id == instance.character_id
                && i.effect_id == instance.effect_id
                && i.source_kind == instance.source_kind
        });
        if duplicate {
            return Err(DomainError::ConcurrencyConflict {
                character_id: instance.character_id,
                effect_id: instance.effect_id,
                source_kind: instance.source_kind,
            });
        }
        self.working.instances.push(instance.clone());
        Ok(())
    }

    async fn update_instance(
        &mut self,
        instance: &AppliedEffectInstance,
    ) -> Result<(), DomainError> {
        let stored = self
            .working
            .instances
            .iter_mut()
            .find(|i| i.id == instance.id)
            .ok_or(DomainError::InstanceNotActive(instance.id))?;
        stored.clone_from(instance);
        Ok(())
    }

    async fn load_live_instance(
        &mut self,
        instance_id: Uuid,
    ) -> Result<Option<AppliedEffectInstance>, DomainError> {
        Ok(self
            .working
            .instances
            .iter()
            .find(|i| i.id == instance_id && i.is_live())
            .cloned())
    }

    async fn list_live_instances(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<AppliedEffectInstance>, DomainError> {
        let mut live: Vec<_> = self
            .working
            .instances
            .iter()
            .filter(|i| i.is_live() && i.character_id == character_id)
            .cloned()
            .collect();
        live.sort_by_key(|i| (i.expires_at_turn, i.id));
        Ok(live)
    }

    async fn decrement_durations(&mut self, scope: TurnScope) -> Result<u64, DomainError> {
        let mut updated = 0;
        for instance in &mut self.working.instances {
            if in_scope(instance, scope) && instance.duration_remaining > 0 {
                instance.duration_remaining -= 1;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn retire_exhausted(
        &mut self,
        scope: TurnScope,
        retired_at: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let mut retired = 0;
        for instance in &mut self.working.instances {
            if in_scope(instance, scope) && instance.duration_remaining <= 0 {
                instance.deleted_at = Some(retired_at);
                retired += 1;
            }
        }
        Ok(retired)
    }

    async fn load_inventory_entry(
        &mut self,
        entry_id: Uuid,
    ) -> Result<Option<InventoryEntry>, DomainError> {
        Ok(self
            .working
            .inventory
            .iter()
            .find(|e| e.id == entry_id && e.is_live())
            .cloned())
    }

    async fn list_inventory(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<InventoryEntry>, DomainError> {
        Ok(self
            .working
            .inventory
            .iter()
            .filter(|e| e.character_id == character_id && e.is_live())
            .cloned()
            .collect())
    }

    async fn save_inventory_entry(&mut self, entry: &InventoryEntry) -> Result<(), DomainError> {
        let stored = self
            .working
            .inventory
            .iter_mut()
            .find(|e| e.id == entry.id)
            .ok_or(DomainError::InventoryEntryNotFound(entry.id))?;
        stored.equipped = entry.equipped;
        stored.quantity = entry.quantity;
        stored.deleted_at = entry.deleted_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self {
            mut guard,
            working,
            commits,
        } = *self;
        *guard = working;
        commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A store whose `begin` always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEffectStore;

#[async_trait]
impl EffectStore for FailingEffectStore {
    async fn begin(&self) -> Result<Box<dyn EffectTransaction>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
