//! Query handlers for the effect engine.
//!
//! Queries open a transaction, read, and drop it without committing.

use std::collections::HashMap;

use campaign_core::error::DomainError;
use campaign_core::model::SourceKind;
use campaign_core::repository::EffectStore;
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of one live applied effect.
#[derive(Debug, Serialize)]
pub struct ActiveEffectView {
    /// The instance identifier.
    pub instance_id: Uuid,
    /// The applied effect.
    pub effect_id: Uuid,
    /// Effect name, when the catalog still has it.
    pub effect_name: Option<String>,
    /// Kind of source that applied it.
    pub source_kind: SourceKind,
    /// The applying item or skill.
    pub source_id: Option<Uuid>,
    /// Stack count.
    pub stacks: i32,
    /// Turns left.
    pub duration_remaining: i32,
    /// Last turn of the window.
    pub expires_at_turn: i32,
    /// Magnitude at the last application.
    pub magnitude: f64,
}

/// Read-only view of one resource pool.
#[derive(Debug, Serialize)]
pub struct PoolView {
    /// Pool name.
    pub name: String,
    /// Spendable value.
    pub current: f64,
    /// Base capacity.
    pub max: f64,
    /// Extra capacity.
    pub bonus: f64,
    /// `max + bonus`.
    pub capacity: f64,
}

/// Read-only view of one attribute.
#[derive(Debug, Serialize)]
pub struct AttributeView {
    /// Attribute name.
    pub name: String,
    /// Sheet value.
    pub base: i32,
    /// Equipment and effect deltas.
    pub equipment_delta: i32,
    /// Other bonus.
    pub extra: i32,
    /// Effective value.
    pub total: i32,
}

/// Read-only status sheet of a character.
#[derive(Debug, Serialize)]
pub struct StatusSheetView {
    /// The character identifier.
    pub character_id: Uuid,
    /// Display name.
    pub name: String,
    /// Pools in storage order.
    pub pools: Vec<PoolView>,
    /// Attributes the character has a row for, by name.
    pub attributes: Vec<AttributeView>,
}

/// Lists a character's live applied effects, soonest expiry first.
///
/// # Errors
///
/// Returns `DomainError` if the store fails.
pub async fn get_active_effects(
    character_id: Uuid,
    store: &dyn EffectStore,
) -> Result<Vec<ActiveEffectView>, DomainError> {
    let mut tx = store.begin().await?;
    let instances = tx.list_live_instances(character_id).await?;

    let mut names: HashMap<Uuid, Option<String>> = HashMap::new();
    let mut views = Vec::with_capacity(instances.len());
    for instance in instances {
        let effect_name = match names.get(&instance.effect_id) {
            Some(name) => name.clone(),
            None => {
                let name = tx
                    .load_effect(instance.effect_id)
                    .await?
                    .map(|effect| effect.name);
                names.insert(instance.effect_id, name.clone());
                name
            }
        };
        views.push(ActiveEffectView {
            instance_id: instance.id,
            effect_id: instance.effect_id,
            effect_name,
            source_kind: instance.source_kind,
            source_id: instance.source_id,
            stacks: instance.stacks,
            duration_remaining: instance.duration_remaining,
            expires_at_turn: instance.expires_at_turn,
            magnitude: instance.cached_magnitude,
        });
    }
    Ok(views)
}

/// Returns a character's pools and attribute totals.
///
/// # Errors
///
/// Returns `DomainError::CharacterNotFound` for an unknown character.
pub async fn get_status_sheet(
    character_id: Uuid,
    store: &dyn EffectStore,
) -> Result<StatusSheetView, DomainError> {
    let mut tx = store.begin().await?;
    let character = tx
        .load_character(character_id)
        .await?
        .ok_or(DomainError::CharacterNotFound(character_id))?;

    let pools = tx
        .load_pools(character_id)
        .await?
        .into_iter()
        .map(|pool| PoolView {
            capacity: pool.capacity(),
            name: pool.name,
            current: pool.current,
            max: pool.max,
            bonus: pool.bonus,
        })
        .collect();

    let catalog: HashMap<Uuid, String> = tx
        .load_attribute_catalog()
        .await?
        .into_iter()
        .map(|attribute| (attribute.id, attribute.name))
        .collect();
    let mut attributes: Vec<AttributeView> = tx
        .load_character_attributes(character_id)
        .await?
        .into_iter()
        .filter_map(|value| {
            let name = catalog.get(&value.attribute_id)?.clone();
            Some(AttributeView {
                name,
                base: value.base,
                equipment_delta: value.equipment_delta,
                extra: value.extra,
                total: value.total(),
            })
        })
        .collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(StatusSheetView {
        character_id,
        name: character.name,
        pools,
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use campaign_core::error::DomainError;
    use campaign_core::model::{DamageType, SourceKind, StackingPolicy};
    use campaign_test_support::{InMemoryEffectStore, StoreState, fixtures};
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn test_get_active_effects_lists_live_instances_by_expiry() {
        // Arrange
        let character_id = Uuid::new_v4();
        let haste = fixtures::effect(DamageType::None, StackingPolicy::Refresh, 3, Vec::new());
        let late = fixtures::instance(character_id, haste.id, SourceKind::Skill, 5);
        let soon = fixtures::instance(character_id, Uuid::new_v4(), SourceKind::Item, 2);
        let mut retired = fixtures::instance(character_id, haste.id, SourceKind::Other, 1);
        retired.deleted_at = Some(chrono::Utc::now());
        let store = InMemoryEffectStore::new(StoreState {
            effects: vec![haste.clone()],
            instances: vec![late.clone(), soon.clone(), retired],
            ..StoreState::default()
        });

        // Act
        let views = get_active_effects(character_id, &store).await.unwrap();

        // Assert
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].instance_id, soon.id);
        assert_eq!(views[0].effect_name, None);
        assert_eq!(views[1].instance_id, late.id);
        assert_eq!(views[1].effect_name.as_deref(), Some("Test Effect"));
    }

    #[tokio::test]
    async fn test_get_status_sheet_reports_pools_and_totals() {
        // Arrange
        let character_id = Uuid::new_v4();
        let strength = fixtures::attribute("Strength");
        let agility = fixtures::attribute("Agility");
        let mut strength_value = fixtures::attribute_value(character_id, &strength, 3);
        strength_value.equipment_delta = 2;
        let mut hp = fixtures::pool(character_id, "HP", 12.0, 20.0);
        hp.bonus = 5.0;
        let store = InMemoryEffectStore::new(StoreState {
            characters: vec![fixtures::character(character_id)],
            attributes: vec![strength.clone(), agility.clone()],
            character_attributes: vec![
                strength_value,
                fixtures::attribute_value(character_id, &agility, 4),
            ],
            pools: vec![hp],
            ..StoreState::default()
        });

        // Act
        let sheet = get_status_sheet(character_id, &store).await.unwrap();

        // Assert
        assert_eq!(sheet.name, "Aria");
        assert_eq!(sheet.pools.len(), 1);
        assert!((sheet.pools[0].capacity - 25.0).abs() < f64::EPSILON);
        assert_eq!(sheet.attributes[0].name, "Agility");
        assert_eq!(sheet.attributes[1].name, "Strength");
        assert_eq!(sheet.attributes[1].total, 5);
    }

    #[tokio::test]
    async fn test_get_status_sheet_unknown_character() {
        let character_id = Uuid::new_v4();

        let result = get_status_sheet(character_id, &InMemoryEffectStore::default()).await;

        match result.unwrap_err() {
            DomainError::CharacterNotFound(id) => assert_eq!(id, character_id),
            other => panic!("expected CharacterNotFound, got {other:?}"),
        }
    }
}
