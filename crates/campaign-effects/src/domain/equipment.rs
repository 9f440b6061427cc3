//! Equipment-driven effects and slot bookkeeping.
//!
//! Equipping an item applies each of its linked effects once with
//! direction `+1`; unequipping applies them again with direction `-1`. Only
//! ADD modifiers are supported on this path.

use campaign_core::error::DomainError;
use campaign_core::model::{EffectDefinition, InventoryEntry, ModifierOperation, SourceKind};
use tracing::debug;
use uuid::Uuid;

use super::formula::{SourceFormula, normalize_key};
use super::pools::{AppliedChange, mutate_pool};
use super::snapshot::CharacterSnapshot;
use super::target::{ResolvedTarget, TriggerContext, resolve_target};

/// Whether effects are being applied or reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Item equipped.
    Apply,
    /// Item unequipped or merged away.
    Reverse,
}

impl Direction {
    /// Sign applied to the link's base value.
    #[must_use]
    pub fn sign(self) -> f64 {
        match self {
            Self::Apply => 1.0,
            Self::Reverse => -1.0,
        }
    }
}

/// What one link application changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EquipmentOutcome {
    /// Pool mutations.
    pub changes: Vec<AppliedChange>,
    /// Whether any attribute row moved.
    pub attributes_changed: bool,
}

/// Applies one item-effect link to the snapshot.
///
/// A link whose formula evaluates to zero changes nothing.
///
/// # Errors
///
/// Returns `DomainError::UnresolvedDynamicTarget` if a dynamic ADD modifier
/// cannot be resolved from the link's formula.
pub fn apply_equipment_link(
    snapshot: &mut CharacterSnapshot,
    effect: &EffectDefinition,
    formula: &SourceFormula,
    direction: Direction,
) -> Result<EquipmentOutcome, DomainError> {
    let base = formula.base_value();
    if base == 0.0 {
        debug!(effect_id = %effect.id, expr = %formula.expr, "Link evaluates to zero, skipping");
        return Ok(EquipmentOutcome::default());
    }

    let trigger = TriggerContext {
        effect_id: effect.id,
        source_kind: SourceKind::Item,
        formula: Some(formula),
    };

    let mut targets = Vec::new();
    for modifier in &effect.modifiers {
        match modifier.operation {
            ModifierOperation::Add => {
                if let Some(target) = resolve_target(modifier, snapshot, &trigger)? {
                    targets.push(target);
                }
            }
            ModifierOperation::Multiply | ModifierOperation::Set => {
                debug!(
                    effect_id = %effect.id,
                    modifier_id = %modifier.id,
                    operation = %modifier.operation,
                    "Equipment effects only support ADD, skipping modifier"
                );
            }
        }
    }

    let delta = base * direction.sign();
    let mut outcome = EquipmentOutcome::default();
    for target in targets {
        match target {
            ResolvedTarget::Pool { index, field } => {
                outcome.changes.push(mutate_pool(
                    snapshot,
                    index,
                    field,
                    ModifierOperation::Add,
                    delta,
                ));
            }
            ResolvedTarget::Attribute { attribute_id } => {
                let rounded = round_delta(delta);
                if rounded == 0 {
                    debug!(%attribute_id, delta, "Attribute delta rounds to zero, skipping");
                    continue;
                }
                snapshot.add_equipment_delta(attribute_id, rounded);
                outcome.attributes_changed = true;
            }
        }
    }
    Ok(outcome)
}

#[allow(clippy::cast_possible_truncation)]
fn round_delta(delta: f64) -> i32 {
    delta.round() as i32
}

/// Normalized slot name used for comparisons.
#[must_use]
pub fn slot_key(slot: &str) -> String {
    normalize_key(slot)
}

/// Finds another live equipped entry occupying `entry`'s slot.
#[must_use]
pub fn slot_occupant<'a>(
    entry: &InventoryEntry,
    inventory: &'a [InventoryEntry],
) -> Option<&'a InventoryEntry> {
    let key = slot_key(entry.slot.as_deref()?);
    if key.is_empty() {
        return None;
    }
    inventory.iter().find(|other| {
        other.id != entry.id
            && other.is_live()
            && other.equipped
            && other.slot.as_deref().map(slot_key).as_deref() == Some(key.as_str())
    })
}

/// How duplicate equipped entries in a slot collapse into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePlan {
    /// Entry that stays equipped and receives the merged quantity.
    pub keeper_id: Uuid,
    /// Entries folded into the keeper, in inventory order.
    pub merged_ids: Vec<Uuid>,
}

/// Plans the merge of live equipped entries in `slot`. Returns `None` when
/// nothing is equipped there.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty slot name and
/// `DomainError::SlotConflict` when the slot holds different items.
pub fn plan_merge(
    character_id: Uuid,
    inventory: &[InventoryEntry],
    slot: &str,
) -> Result<Option<MergePlan>, DomainError> {
    let key = slot_key(slot);
    if key.is_empty() {
        return Err(DomainError::Validation("slot name must not be empty".to_owned()));
    }

    let mut occupants = inventory.iter().filter(|entry| {
        entry.character_id == character_id
            && entry.is_live()
            && entry.equipped
            && entry.slot.as_deref().map(slot_key).as_deref() == Some(key.as_str())
    });
    let Some(keeper) = occupants.next() else {
        return Ok(None);
    };

    let mut merged_ids = Vec::new();
    for entry in occupants {
        if entry.item_id != keeper.item_id {
            return Err(DomainError::SlotConflict {
                character_id,
                slot: slot.to_owned(),
            });
        }
        merged_ids.push(entry.id);
    }

    Ok(Some(MergePlan {
        keeper_id: keeper.id,
        merged_ids,
    }))
}
