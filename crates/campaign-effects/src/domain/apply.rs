//! Applies an effect's resource-pool modifiers to a snapshot.
//!
//! Every target is resolved before the first mutation, so an unresolved
//! dynamic modifier leaves the snapshot untouched.

use campaign_core::error::DomainError;
use campaign_core::model::{
    ComponentKind, DamageType, EffectDefinition, EffectModifier, ModifierOperation, PoolField,
};

use super::pools::{AppliedChange, mutate_pool};
use super::resistance::mitigation;
use super::snapshot::CharacterSnapshot;
use super::target::{ResolvedTarget, TriggerContext, resolve_target};

/// A resource-pool modifier paired with its resolved field.
#[derive(Debug, Clone, Copy)]
pub struct PoolTarget<'a> {
    /// The modifier being applied.
    pub modifier: &'a EffectModifier,
    /// Snapshot pool index.
    pub index: usize,
    /// Targeted field.
    pub field: PoolField,
}

/// Resolves every resource-pool modifier of `effect`. Attribute modifiers
/// and unresolved static modifiers are left out.
///
/// # Errors
///
/// Returns `DomainError::UnresolvedDynamicTarget` if any dynamic modifier
/// cannot be resolved.
pub fn resolve_pool_targets<'a>(
    effect: &'a EffectDefinition,
    snapshot: &CharacterSnapshot,
    trigger: &TriggerContext<'_>,
) -> Result<Vec<PoolTarget<'a>>, DomainError> {
    let mut targets = Vec::new();
    for modifier in &effect.modifiers {
        if modifier.component_kind != ComponentKind::ResourcePool {
            continue;
        }
        if let Some(ResolvedTarget::Pool { index, field }) =
            resolve_target(modifier, snapshot, trigger)?
        {
            targets.push(PoolTarget {
                modifier,
                index,
                field,
            });
        }
    }
    Ok(targets)
}

/// Applies an instant effect: `value_per_stack * stacks_delta` per target,
/// with resistance mitigation on typed damage to hit points.
///
/// # Errors
///
/// Returns `DomainError::UnresolvedDynamicTarget` if any dynamic modifier
/// cannot be resolved; the snapshot is then unchanged.
pub fn apply_immediate(
    snapshot: &mut CharacterSnapshot,
    effect: &EffectDefinition,
    trigger: &TriggerContext<'_>,
    stacks_delta: i32,
    value_per_stack: f64,
) -> Result<Vec<AppliedChange>, DomainError> {
    let targets = resolve_pool_targets(effect, snapshot, trigger)?;
    let raw_delta = value_per_stack * f64::from(stacks_delta);

    let mut changes = Vec::with_capacity(targets.len());
    for target in targets {
        let mut delta = raw_delta;
        let mitigated = target.modifier.operation == ModifierOperation::Add
            && target.field == PoolField::Current
            && effect.damage_type != DamageType::None
            && raw_delta < 0.0
            && snapshot.is_hit_points(target.index);
        if mitigated {
            // Mitigation can cancel damage but never turn it into healing.
            delta = (raw_delta + mitigation(snapshot, effect.damage_type)).min(0.0);
        }
        changes.push(mutate_pool(
            snapshot,
            target.index,
            target.field,
            target.modifier.operation,
            delta,
        ));
    }
    Ok(changes)
}

/// Applies a timed effect's total magnitude, `value_per_stack * stacks`,
/// once per resolved target. Nothing happens when `value_per_stack` is zero.
pub fn apply_timed(
    snapshot: &mut CharacterSnapshot,
    targets: &[PoolTarget<'_>],
    value_per_stack: f64,
    stacks: i32,
) -> Vec<AppliedChange> {
    if value_per_stack == 0.0 {
        return Vec::new();
    }
    let delta = value_per_stack * f64::from(stacks);
    targets
        .iter()
        .map(|target| {
            mutate_pool(
                snapshot,
                target.index,
                target.field,
                target.modifier.operation,
                delta,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::formula::parse_source_formula;
    use campaign_core::model::{
        AttributeDefinition, CharacterAttributeValue, DYNAMIC_PLACEHOLDER, ResourcePool,
        SourceKind, StackingPolicy,
    };
    use uuid::Uuid;

    fn pool(name: &str, current: f64, max: f64) -> ResourcePool {
        ResourcePool {
            id: Uuid::new_v4(),
            character_id: Uuid::nil(),
            name: name.to_owned(),
            current,
            max,
            bonus: 0.0,
        }
    }

    fn modifier(kind: ComponentKind, name: &str, operation: ModifierOperation) -> EffectModifier {
        EffectModifier {
            id: Uuid::new_v4(),
            component_kind: kind,
            component_name: name.to_owned(),
            operation,
        }
    }

    fn effect(damage_type: DamageType, modifiers: Vec<EffectModifier>) -> EffectDefinition {
        EffectDefinition {
            id: Uuid::new_v4(),
            name: "Strike".to_owned(),
            damage_type,
            stacking_policy: StackingPolicy::Replace,
            base_duration_turns: 0,
            deleted_at: None,
            modifiers,
        }
    }

    fn trigger(effect: &EffectDefinition) -> TriggerContext<'static> {
        TriggerContext {
            effect_id: effect.id,
            source_kind: SourceKind::Skill,
            formula: None,
        }
    }

    fn snapshot_with_resistance(pools: Vec<ResourcePool>, resistance: i32) -> CharacterSnapshot {
        let definition = AttributeDefinition {
            id: Uuid::new_v4(),
            name: "Physical Resistance".to_owned(),
        };
        let value = CharacterAttributeValue {
            character_id: Uuid::nil(),
            attribute_id: definition.id,
            base: resistance,
            equipment_delta: 0,
            extra: 0,
        };
        CharacterSnapshot::new(Uuid::nil(), pools, vec![definition], vec![value])
    }

    #[test]
    fn test_physical_damage_is_mitigated_by_resistance_attribute() {
        // Arrange
        let mut snapshot = snapshot_with_resistance(vec![pool("HP", 20.0, 30.0)], 4);
        let strike = effect(
            DamageType::Physical,
            vec![modifier(ComponentKind::ResourcePool, "HP", ModifierOperation::Add)],
        );

        // Act
        let changes = apply_immediate(&mut snapshot, &strike, &trigger(&strike), 1, -8.0).unwrap();

        // Assert
        assert_eq!(changes.len(), 1);
        assert!((changes[0].delta + 4.0).abs() < f64::EPSILON);
        assert!((snapshot.pool(0).current - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mitigation_never_turns_damage_into_healing() {
        let mut snapshot = snapshot_with_resistance(vec![pool("HP", 20.0, 30.0)], 10);
        let strike = effect(
            DamageType::Physical,
            vec![modifier(ComponentKind::ResourcePool, "HP", ModifierOperation::Add)],
        );

        let changes = apply_immediate(&mut snapshot, &strike, &trigger(&strike), 1, -3.0).unwrap();

        assert!(changes[0].delta.abs() < f64::EPSILON);
        assert!((snapshot.pool(0).current - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_untyped_damage_and_other_pools_skip_mitigation() {
        let mut snapshot =
            snapshot_with_resistance(vec![pool("HP", 20.0, 30.0), pool("MP", 10.0, 10.0)], 4);
        let drain = effect(
            DamageType::Physical,
            vec![modifier(ComponentKind::ResourcePool, "MP", ModifierOperation::Add)],
        );

        apply_immediate(&mut snapshot, &drain, &trigger(&drain), 1, -6.0).unwrap();

        assert!((snapshot.pool(1).current - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_points_can_drop_below_zero() {
        let mut snapshot = snapshot_with_resistance(vec![pool("HP", 3.0, 30.0)], 0);
        let strike = effect(
            DamageType::Magic,
            vec![modifier(ComponentKind::ResourcePool, "HP", ModifierOperation::Add)],
        );

        apply_immediate(&mut snapshot, &strike, &trigger(&strike), 2, -5.0).unwrap();

        assert!((snapshot.pool(0).current + 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_later_modifiers_see_earlier_mutations() {
        let mut snapshot = snapshot_with_resistance(vec![pool("MP", 4.0, 20.0)], 0);
        let surge = effect(
            DamageType::None,
            vec![
                modifier(ComponentKind::ResourcePool, "MP", ModifierOperation::Add),
                modifier(ComponentKind::ResourcePool, "MP", ModifierOperation::Multiply),
            ],
        );

        let changes = apply_immediate(&mut snapshot, &surge, &trigger(&surge), 1, 2.0).unwrap();

        assert!((changes[1].initial_value - 6.0).abs() < f64::EPSILON);
        assert!((snapshot.pool(0).current - 12.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unresolved_dynamic_modifier_leaves_snapshot_untouched() {
        let mut snapshot = snapshot_with_resistance(vec![pool("MP", 4.0, 20.0)], 0);
        let surge = effect(
            DamageType::None,
            vec![
                modifier(ComponentKind::ResourcePool, "MP", ModifierOperation::Add),
                modifier(
                    ComponentKind::ResourcePool,
                    DYNAMIC_PLACEHOLDER,
                    ModifierOperation::Add,
                ),
            ],
        );

        let result = apply_immediate(&mut snapshot, &surge, &trigger(&surge), 1, 2.0);

        assert!(matches!(
            result,
            Err(DomainError::UnresolvedDynamicTarget { .. })
        ));
        assert!(snapshot.pool_writes().is_empty());
    }

    #[test]
    fn test_resolve_pool_targets_uses_formula_for_dynamic_modifiers() {
        let snapshot = snapshot_with_resistance(vec![pool("HP", 4.0, 20.0)], 0);
        let ward = effect(
            DamageType::None,
            vec![
                modifier(
                    ComponentKind::ResourcePool,
                    DYNAMIC_PLACEHOLDER,
                    ModifierOperation::Add,
                ),
                modifier(ComponentKind::Attribute, "Strength", ModifierOperation::Add),
            ],
        );
        let formula = parse_source_formula(r#"{"expr": 1, "target": "resource.HP.bonus"}"#);
        let context = TriggerContext {
            effect_id: ward.id,
            source_kind: SourceKind::Item,
            formula: Some(&formula),
        };

        let targets = resolve_pool_targets(&ward, &snapshot, &context).unwrap();

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].field, PoolField::Bonus);
    }

    #[test]
    fn test_apply_timed_uses_total_stacks() {
        let mut snapshot = snapshot_with_resistance(vec![pool("MP", 5.0, 20.0)], 0);
        let regen = effect(
            DamageType::None,
            vec![modifier(ComponentKind::ResourcePool, "MP", ModifierOperation::Add)],
        );
        let targets = resolve_pool_targets(&regen, &snapshot, &trigger(&regen)).unwrap();

        let changes = apply_timed(&mut snapshot, &targets, 2.0, 3);

        assert!((changes[0].delta - 6.0).abs() < f64::EPSILON);
        assert!((snapshot.pool(0).current - 11.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_apply_timed_with_zero_value_is_a_no_op() {
        let mut snapshot = snapshot_with_resistance(vec![pool("MP", 5.0, 20.0)], 0);
        let regen = effect(
            DamageType::None,
            vec![modifier(ComponentKind::ResourcePool, "MP", ModifierOperation::Set)],
        );
        let targets = resolve_pool_targets(&regen, &snapshot, &trigger(&regen)).unwrap();

        let changes = apply_timed(&mut snapshot, &targets, 0.0, 3);

        assert!(changes.is_empty());
        assert!((snapshot.pool(0).current - 5.0).abs() < f64::EPSILON);
    }
}
