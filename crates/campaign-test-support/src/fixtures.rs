//! Row builders for seeding stores in tests.

use campaign_core::model::{
    AppliedEffectInstance, AttributeDefinition, CharacterAttributeValue, CharacterProfile,
    ComponentKind, DamageType, EffectDefinition, EffectModifier, InventoryEntry,
    ModifierOperation, ResourcePool, SourceEffectLink, SourceKind, StackingPolicy,
};
use uuid::Uuid;

/// A character header without archetype.
#[must_use]
pub fn character(character_id: Uuid) -> CharacterProfile {
    CharacterProfile {
        id: character_id,
        name: "Aria".to_owned(),
        archetype_id: None,
    }
}

/// A pool with no bonus.
#[must_use]
pub fn pool(character_id: Uuid, name: &str, current: f64, max: f64) -> ResourcePool {
    ResourcePool {
        id: Uuid::new_v4(),
        character_id,
        name: name.to_owned(),
        current,
        max,
        bonus: 0.0,
    }
}

/// An attribute catalog entry.
#[must_use]
pub fn attribute(name: &str) -> AttributeDefinition {
    AttributeDefinition {
        id: Uuid::new_v4(),
        name: name.to_owned(),
    }
}

/// A character attribute row with only a base value.
#[must_use]
pub fn attribute_value(
    character_id: Uuid,
    attribute: &AttributeDefinition,
    base: i32,
) -> CharacterAttributeValue {
    CharacterAttributeValue {
        character_id,
        attribute_id: attribute.id,
        base,
        equipment_delta: 0,
        extra: 0,
    }
}

/// A modifier.
#[must_use]
pub fn modifier(
    component_kind: ComponentKind,
    component_name: &str,
    operation: ModifierOperation,
) -> EffectModifier {
    EffectModifier {
        id: Uuid::new_v4(),
        component_kind,
        component_name: component_name.to_owned(),
        operation,
    }
}

/// An effect definition.
#[must_use]
pub fn effect(
    damage_type: DamageType,
    stacking_policy: StackingPolicy,
    base_duration_turns: i32,
    modifiers: Vec<EffectModifier>,
) -> EffectDefinition {
    EffectDefinition {
        id: Uuid::new_v4(),
        name: "Test Effect".to_owned(),
        damage_type,
        stacking_policy,
        base_duration_turns,
        deleted_at: None,
        modifiers,
    }
}

/// A source link.
#[must_use]
pub fn link(
    source_kind: SourceKind,
    source_id: Uuid,
    effect_id: Uuid,
    formula: &str,
) -> SourceEffectLink {
    SourceEffectLink {
        source_kind,
        source_id,
        effect_id,
        formula: formula.to_owned(),
        deleted_at: None,
    }
}

/// A live single-stack instance started on turn zero.
#[must_use]
pub fn instance(
    character_id: Uuid,
    effect_id: Uuid,
    source_kind: SourceKind,
    duration_remaining: i32,
) -> AppliedEffectInstance {
    AppliedEffectInstance {
        id: Uuid::new_v4(),
        character_id,
        effect_id,
        source_kind,
        source_id: None,
        duration_remaining,
        started_at_turn: 0,
        expires_at_turn: duration_remaining,
        stacks: 1,
        cached_magnitude: 0.0,
        deleted_at: None,
    }
}

/// A live, unequipped inventory entry.
#[must_use]
pub fn inventory_entry(character_id: Uuid, item_id: Uuid, slot: Option<&str>) -> InventoryEntry {
    InventoryEntry {
        id: Uuid::new_v4(),
        character_id,
        item_id,
        slot: slot.map(str::to_owned),
        quantity: 1,
        equipped: false,
        deleted_at: None,
    }
}
