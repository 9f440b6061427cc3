//! `PostgreSQL` implementation of the `EffectStore` ports.
//!
//! Each engine transaction maps onto one database transaction. Pools, the
//! candidate applied effect, and inventory entries are read `FOR UPDATE` so
//! concurrent callers on the same character serialize on row locks.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use campaign_core::error::DomainError;
use campaign_core::model::{
    AppliedEffectInstance, Archetype, AttributeDefinition, CharacterAttributeValue,
    CharacterProfile, EffectDefinition, EffectModifier, InventoryEntry, PoolWrite, ResourcePool,
    SourceEffectLink, SourceKind,
};
use campaign_core::repository::{EffectStore, EffectTransaction, TurnScope};

/// Partial unique index allowing one live instance per stacking key.
const LIVE_KEY_INDEX: &str = "uq_applied_effects_live_key";

/// PostgreSQL-backed effect store.
#[derive(Debug, Clone)]
pub struct PgEffectStore {
    pool: PgPool,
}

impl PgEffectStore {
    /// Creates a new `PgEffectStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EffectStore for PgEffectStore {
    async fn begin(&self) -> Result<Box<dyn EffectTransaction>, DomainError> {
        let tx = self.pool.begin().await.map_err(infrastructure)?;
        Ok(Box::new(PgEffectTransaction { tx }))
    }
}

/// An open database transaction. Dropping it rolls back.
pub struct PgEffectTransaction {
    tx: Transaction<'static, Postgres>,
}

fn infrastructure(error: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(error.to_string())
}

fn is_live_key_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() && db.constraint() == Some(LIVE_KEY_INDEX)
        }
        _ => false,
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column).map_err(infrastructure)
}

fn text<T>(row: &PgRow, column: &str) -> Result<T, DomainError>
where
    T: FromStr<Err = DomainError>,
{
    get::<String>(row, column)?.parse()
}

fn instance_from_row(row: &PgRow) -> Result<AppliedEffectInstance, DomainError> {
    Ok(AppliedEffectInstance {
        id: get(row, "id")?,
        character_id: get(row, "character_id")?,
        effect_id: get(row, "effect_id")?,
        source_kind: text(row, "source_kind")?,
        source_id: get(row, "source_id")?,
        duration_remaining: get(row, "duration_remaining")?,
        started_at_turn: get(row, "started_at_turn")?,
        expires_at_turn: get(row, "expires_at_turn")?,
        stacks: get(row, "stacks")?,
        cached_magnitude: get(row, "cached_magnitude")?,
        deleted_at: get(row, "deleted_at")?,
    })
}

fn pool_from_row(row: &PgRow) -> Result<ResourcePool, DomainError> {
    Ok(ResourcePool {
        id: get(row, "id")?,
        character_id: get(row, "character_id")?,
        name: get(row, "name")?,
        current: get(row, "current_value")?,
        max: get(row, "max_value")?,
        bonus: get(row, "bonus_value")?,
    })
}

fn link_from_row(row: &PgRow) -> Result<SourceEffectLink, DomainError> {
    Ok(SourceEffectLink {
        source_kind: text(row, "source_kind")?,
        source_id: get(row, "source_id")?,
        effect_id: get(row, "effect_id")?,
        formula: get(row, "formula")?,
        deleted_at: get(row, "deleted_at")?,
    })
}

fn inventory_from_row(row: &PgRow) -> Result<InventoryEntry, DomainError> {
    Ok(InventoryEntry {
        id: get(row, "id")?,
        character_id: get(row, "character_id")?,
        item_id: get(row, "item_id")?,
        slot: get(row, "slot")?,
        quantity: get(row, "quantity")?,
        equipped: get(row, "equipped")?,
        deleted_at: get(row, "deleted_at")?,
    })
}

#[async_trait]
impl EffectTransaction for PgEffectTransaction {
    async fn load_effect(
        &mut self,
        effect_id: Uuid,
    ) -> Result<Option<EffectDefinition>, DomainError> {
        let Some(row) = sqlx::query(
            r"
            SELECT id, name, damage_type, stacking_policy, base_duration_turns, deleted_at
            FROM effects
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(effect_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        else {
            return Ok(None);
        };

        let modifiers = sqlx::query(
            r"
            SELECT id, component_kind, component_name, operation
            FROM effect_modifiers
            WHERE effect_id = $1
            ORDER BY position, id
            ",
        )
        .bind(effect_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .iter()
        .map(|m| {
            Ok(EffectModifier {
                id: get(m, "id")?,
                component_kind: text(m, "component_kind")?,
                component_name: get(m, "component_name")?,
                operation: text(m, "operation")?,
            })
        })
        .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Some(EffectDefinition {
            id: get(&row, "id")?,
            name: get(&row, "name")?,
            damage_type: text(&row, "damage_type")?,
            stacking_policy: text(&row, "stacking_policy")?,
            base_duration_turns: get(&row, "base_duration_turns")?,
            deleted_at: get(&row, "deleted_at")?,
            modifiers,
        }))
    }

    async fn load_source_link(
        &mut self,
        source_kind: SourceKind,
        source_id: Uuid,
        effect_id: Uuid,
    ) -> Result<Option<SourceEffectLink>, DomainError> {
        sqlx::query(
            r"
            SELECT source_kind, source_id, effect_id, formula, deleted_at
            FROM source_effect_links
            WHERE source_kind = $1 AND source_id = $2 AND effect_id = $3
              AND deleted_at IS NULL
            ",
        )
        .bind(source_kind.as_str())
        .bind(source_id)
        .bind(effect_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .as_ref()
        .map(link_from_row)
        .transpose()
    }

    async fn load_source_links(
        &mut self,
        source_kind: SourceKind,
        source_id: Uuid,
    ) -> Result<Vec<SourceEffectLink>, DomainError> {
        sqlx::query(
            r"
            SELECT source_kind, source_id, effect_id, formula, deleted_at
            FROM source_effect_links
            WHERE source_kind = $1 AND source_id = $2 AND deleted_at IS NULL
            ORDER BY effect_id
            ",
        )
        .bind(source_kind.as_str())
        .bind(source_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .iter()
        .map(link_from_row)
        .collect()
    }

    async fn load_attribute_catalog(&mut self) -> Result<Vec<AttributeDefinition>, DomainError> {
        sqlx::query("SELECT id, name FROM attributes ORDER BY name, id")
            .fetch_all(&mut *self.tx)
            .await
            .map_err(infrastructure)?
            .iter()
            .map(|row| {
                Ok(AttributeDefinition {
                    id: get(row, "id")?,
                    name: get(row, "name")?,
                })
            })
            .collect()
    }

    async fn load_character(
        &mut self,
        character_id: Uuid,
    ) -> Result<Option<CharacterProfile>, DomainError> {
        sqlx::query("SELECT id, name, archetype_id FROM characters WHERE id = $1")
            .bind(character_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(infrastructure)?
            .map(|row| {
                Ok(CharacterProfile {
                    id: get(&row, "id")?,
                    name: get(&row, "name")?,
                    archetype_id: get(&row, "archetype_id")?,
                })
            })
            .transpose()
    }

    async fn load_archetype(
        &mut self,
        archetype_id: Uuid,
    ) -> Result<Option<Archetype>, DomainError> {
        sqlx::query(
            "SELECT id, name, hp_scaling, mp_scaling, tp_scaling FROM archetypes WHERE id = $1",
        )
        .bind(archetype_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .map(|row| {
            Ok(Archetype {
                id: get(&row, "id")?,
                name: get(&row, "name")?,
                hp_scaling: get(&row, "hp_scaling")?,
                mp_scaling: get(&row, "mp_scaling")?,
                tp_scaling: get(&row, "tp_scaling")?,
            })
        })
        .transpose()
    }

    async fn load_pools(&mut self, character_id: Uuid) -> Result<Vec<ResourcePool>, DomainError> {
        sqlx::query(
            r"
            SELECT id, character_id, name, current_value, max_value, bonus_value
            FROM resource_pools
            WHERE character_id = $1
            ORDER BY created_at, id
            FOR UPDATE
            ",
        )
        .bind(character_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .iter()
        .map(pool_from_row)
        .collect()
    }

    async fn write_pool(&mut self, write: &PoolWrite) -> Result<(), DomainError> {
        let result = sqlx::query(
            r"
            UPDATE resource_pools
            SET current_value = COALESCE($2, current_value),
                max_value     = COALESCE($3, max_value),
                bonus_value   = COALESCE($4, bonus_value)
            WHERE id = $1
            ",
        )
        .bind(write.pool_id)
        .bind(write.current)
        .bind(write.max)
        .bind(write.bonus)
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::Infrastructure(format!(
                "pool {} does not exist",
                write.pool_id
            )));
        }
        Ok(())
    }

    async fn load_character_attributes(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<CharacterAttributeValue>, DomainError> {
        sqlx::query(
            r"
            SELECT character_id, attribute_id, base, equipment_delta, extra
            FROM character_attributes
            WHERE character_id = $1
            FOR UPDATE
            ",
        )
        .bind(character_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .iter()
        .map(|row| {
            Ok(CharacterAttributeValue {
                character_id: get(row, "character_id")?,
                attribute_id: get(row, "attribute_id")?,
                base: get(row, "base")?,
                equipment_delta: get(row, "equipment_delta")?,
                extra: get(row, "extra")?,
            })
        })
        .collect()
    }

    async fn add_equipment_delta(
        &mut self,
        character_id: Uuid,
        attribute_id: Uuid,
        delta: i32,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r"
            INSERT INTO character_attributes (character_id, attribute_id, equipment_delta)
            VALUES ($1, $2, $3)
            ON CONFLICT (character_id, attribute_id)
            DO UPDATE SET equipment_delta = character_attributes.equipment_delta
                                            + EXCLUDED.equipment_delta
            ",
        )
        .bind(character_id)
        .bind(attribute_id)
        .bind(delta)
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;
        Ok(())
    }

    async fn find_active_instance(
        &mut self,
        character_id: Uuid,
        effect_id: Uuid,
        source_kind: SourceKind,
        current_turn: i32,
    ) -> Result<Option<AppliedEffectInstance>, DomainError> {
        sqlx::query(
            r"
            SELECT id, character_id, effect_id, source_kind, source_id, duration_remaining,
                   started_at_turn, expires_at_turn, stacks, cached_magnitude, deleted_at
            FROM applied_effects
            WHERE character_id = $1 AND effect_id = $2 AND source_kind = $3
              AND deleted_at IS NULL AND expires_at_turn >= $4
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            FOR UPDATE
            ",
        )
        .bind(character_id)
        .bind(effect_id)
        .bind(source_kind.as_str())
        .bind(current_turn)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .as_ref()
        .map(instance_from_row)
        .transpose()
    }

    async fn retire_stale_instances(
        &mut self,
        character_id: Uuid,
        effect_id: Uuid,
        source_kind: SourceKind,
        current_turn: i32,
        retired_at: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE applied_effects
            SET deleted_at = $5
            WHERE character_id = $1 AND effect_id = $2 AND source_kind = $3
              AND deleted_at IS NULL AND expires_at_turn < $4
            ",
        )
        .bind(character_id)
        .bind(effect_id)
        .bind(source_kind.as_str())
        .bind(current_turn)
        .bind(retired_at)
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;
        Ok(result.rows_affected())
    }

    async fn insert_instance(
        &mut self,
        instance: &AppliedEffectInstance,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r"
            INSERT INTO applied_effects (
                id, character_id, effect_id, source_kind, source_id, duration_remaining,
                started_at_turn, expires_at_turn, stacks, cached_magnitude, deleted_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ",
        )
        .bind(instance.id)
        .bind(instance.character_id)
        .bind(instance.effect_id)
        .bind(instance.source_kind.as_str())
        .bind(instance.source_id)
        .bind(instance.duration_remaining)
        .bind(instance.started_at_turn)
        .bind(instance.expires_at_turn)
        .bind(instance.stacks)
        .bind(instance.cached_magnitude)
        .bind(instance.deleted_at)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_live_key_violation(&e) => {
                debug!(
                    character_id = %instance.character_id,
                    effect_id = %instance.effect_id,
                    "Live applied effect already exists"
                );
                Err(DomainError::ConcurrencyConflict {
                    character_id: instance.character_id,
                    effect_id: instance.effect_id,
                    source_kind: instance.source_kind,
                })
            }
            Err(e) => Err(infrastructure(e)),
        }
    }

    async fn update_instance(
        &mut self,
        instance: &AppliedEffectInstance,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r"
            UPDATE applied_effects
            SET duration_remaining = $2,
                started_at_turn    = $3,
                expires_at_turn    = $4,
                stacks             = $5,
                cached_magnitude   = $6,
                deleted_at         = $7
            WHERE id = $1
            ",
        )
        .bind(instance.id)
        .bind(instance.duration_remaining)
        .bind(instance.started_at_turn)
        .bind(instance.expires_at_turn)
        .bind(instance.stacks)
        .bind(instance.cached_magnitude)
        .bind(instance.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::InstanceNotActive(instance.id));
        }
        Ok(())
    }

    async fn load_live_instance(
        &mut self,
        instance_id: Uuid,
    ) -> Result<Option<AppliedEffectInstance>, DomainError> {
        sqlx::query(
            r"
            SELECT id, character_id, effect_id, source_kind, source_id, duration_remaining,
                   started_at_turn, expires_at_turn, stacks, cached_magnitude, deleted_at
            FROM applied_effects
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            ",
        )
        .bind(instance_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .as_ref()
        .map(instance_from_row)
        .transpose()
    }

    async fn list_live_instances(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<AppliedEffectInstance>, DomainError> {
        sqlx::query(
            r"
            SELECT id, character_id, effect_id, source_kind, source_id, duration_remaining,
                   started_at_turn, expires_at_turn, stacks, cached_magnitude, deleted_at
            FROM applied_effects
            WHERE character_id = $1 AND deleted_at IS NULL
            ORDER BY expires_at_turn, id
            ",
        )
        .bind(character_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .iter()
        .map(instance_from_row)
        .collect()
    }

    async fn decrement_durations(&mut self, scope: TurnScope) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE applied_effects
            SET duration_remaining = duration_remaining - 1
            WHERE deleted_at IS NULL AND duration_remaining > 0
              AND ($1::uuid IS NULL OR character_id = $1)
            ",
        )
        .bind(scope.character_id())
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;
        Ok(result.rows_affected())
    }

    async fn retire_exhausted(
        &mut self,
        scope: TurnScope,
        retired_at: DateTime<Utc>,
    ) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE applied_effects
            SET deleted_at = $2
            WHERE deleted_at IS NULL AND duration_remaining <= 0
              AND ($1::uuid IS NULL OR character_id = $1)
            ",
        )
        .bind(scope.character_id())
        .bind(retired_at)
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;
        Ok(result.rows_affected())
    }

    async fn load_inventory_entry(
        &mut self,
        entry_id: Uuid,
    ) -> Result<Option<InventoryEntry>, DomainError> {
        sqlx::query(
            r"
            SELECT id, character_id, item_id, slot, quantity, equipped, deleted_at
            FROM inventory_entries
            WHERE id = $1 AND deleted_at IS NULL
            FOR UPDATE
            ",
        )
        .bind(entry_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .as_ref()
        .map(inventory_from_row)
        .transpose()
    }

    async fn list_inventory(
        &mut self,
        character_id: Uuid,
    ) -> Result<Vec<InventoryEntry>, DomainError> {
        sqlx::query(
            r"
            SELECT id, character_id, item_id, slot, quantity, equipped, deleted_at
            FROM inventory_entries
            WHERE character_id = $1 AND deleted_at IS NULL
            ORDER BY created_at, id
            FOR UPDATE
            ",
        )
        .bind(character_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(infrastructure)?
        .iter()
        .map(inventory_from_row)
        .collect()
    }

    async fn save_inventory_entry(&mut self, entry: &InventoryEntry) -> Result<(), DomainError> {
        let result = sqlx::query(
            r"
            UPDATE inventory_entries
            SET equipped = $2, quantity = $3, deleted_at = $4
            WHERE id = $1
            ",
        )
        .bind(entry.id)
        .bind(entry.equipped)
        .bind(entry.quantity)
        .bind(entry.deleted_at)
        .execute(&mut *self.tx)
        .await
        .map_err(infrastructure)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::InventoryEntryNotFound(entry.id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(infrastructure)
    }
}
