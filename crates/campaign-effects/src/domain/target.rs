//! Maps effect modifiers to concrete pool fields or attributes.

use campaign_core::error::DomainError;
use campaign_core::model::{ComponentKind, EffectModifier, PoolField, SourceKind};
use tracing::debug;
use uuid::Uuid;

use super::formula::{SourceFormula, TargetToken};
use super::snapshot::CharacterSnapshot;

/// A concrete target inside a [`CharacterSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// A pool field, addressed by snapshot index.
    Pool {
        /// Index into the snapshot's pool arena.
        index: usize,
        /// Targeted field.
        field: PoolField,
    },
    /// An attribute.
    Attribute {
        /// Attribute identifier.
        attribute_id: Uuid,
    },
}

/// What triggered the application, used for dynamic resolution and error
/// reporting.
#[derive(Debug, Clone, Copy)]
pub struct TriggerContext<'a> {
    /// Effect being applied.
    pub effect_id: Uuid,
    /// Kind of the triggering source.
    pub source_kind: SourceKind,
    /// The source link's parsed formula, when the source has one.
    pub formula: Option<&'a SourceFormula>,
}

/// Resolves `modifier` against `snapshot`.
///
/// Static modifiers that match nothing resolve to `Ok(None)` and are skipped
/// by callers. Dynamic modifiers that match nothing are an error.
///
/// # Errors
///
/// Returns `DomainError::UnresolvedDynamicTarget` when a dynamic modifier has
/// no usable target token or the token matches nothing.
pub fn resolve_target(
    modifier: &EffectModifier,
    snapshot: &CharacterSnapshot,
    trigger: &TriggerContext<'_>,
) -> Result<Option<ResolvedTarget>, DomainError> {
    if modifier.is_dynamic() {
        return resolve_dynamic(modifier, snapshot, trigger).map(Some);
    }

    let resolved = match modifier.component_kind {
        ComponentKind::ResourcePool => {
            snapshot
                .find_pool(&modifier.component_name)
                .map(|index| ResolvedTarget::Pool {
                    index,
                    field: PoolField::Current,
                })
        }
        ComponentKind::Attribute => snapshot
            .find_attribute(&modifier.component_name)
            .map(|attribute| ResolvedTarget::Attribute {
                attribute_id: attribute.id,
            }),
    };

    if resolved.is_none() {
        debug!(
            modifier_id = %modifier.id,
            component_name = %modifier.component_name,
            "Static modifier target not found, skipping"
        );
    }
    Ok(resolved)
}

fn resolve_dynamic(
    modifier: &EffectModifier,
    snapshot: &CharacterSnapshot,
    trigger: &TriggerContext<'_>,
) -> Result<ResolvedTarget, DomainError> {
    let unresolved = |reason: String| DomainError::UnresolvedDynamicTarget {
        effect_id: trigger.effect_id,
        source_kind: trigger.source_kind,
        reason,
    };

    let formula = trigger
        .formula
        .ok_or_else(|| unresolved("no source formula supplies a target".to_owned()))?;
    let raw = formula
        .target
        .as_deref()
        .ok_or_else(|| unresolved("source formula has no target token".to_owned()))?;
    let token = formula
        .target_token()
        .ok_or_else(|| unresolved(format!("malformed target token '{raw}'")))?;

    if token.component_kind() != modifier.component_kind {
        return Err(unresolved(format!(
            "target token '{raw}' addresses {} but modifier {} declares {}",
            token.component_kind(),
            modifier.id,
            modifier.component_kind
        )));
    }

    match token {
        TargetToken::Resource { name, field } => snapshot
            .find_pool(&name)
            .map(|index| ResolvedTarget::Pool { index, field })
            .ok_or_else(|| unresolved(format!("no resource pool named '{name}'"))),
        TargetToken::Attribute { slug } => snapshot
            .find_attribute(&slug)
            .map(|attribute| ResolvedTarget::Attribute {
                attribute_id: attribute.id,
            })
            .ok_or_else(|| unresolved(format!("no attribute with slug '{slug}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::formula::parse_source_formula;
    use campaign_core::model::{
        AttributeDefinition, DYNAMIC_PLACEHOLDER, ModifierOperation, ResourcePool,
    };

    fn snapshot() -> CharacterSnapshot {
        let pools = ["Hit Points", "Mana"]
            .iter()
            .map(|name| ResourcePool {
                id: Uuid::new_v4(),
                character_id: Uuid::nil(),
                name: (*name).to_owned(),
                current: 5.0,
                max: 10.0,
                bonus: 0.0,
            })
            .collect();
        let catalog = vec![AttributeDefinition {
            id: Uuid::from_u128(7),
            name: "Strength".to_owned(),
        }];
        CharacterSnapshot::new(Uuid::nil(), pools, catalog, Vec::new())
    }

    fn modifier(kind: ComponentKind, name: &str) -> EffectModifier {
        EffectModifier {
            id: Uuid::new_v4(),
            component_kind: kind,
            component_name: name.to_owned(),
            operation: ModifierOperation::Add,
        }
    }

    fn trigger(formula: Option<&SourceFormula>) -> TriggerContext<'_> {
        TriggerContext {
            effect_id: Uuid::from_u128(1),
            source_kind: SourceKind::Item,
            formula,
        }
    }

    #[test]
    fn test_static_pool_resolves_to_current_field() {
        let snapshot = snapshot();

        let resolved = resolve_target(
            &modifier(ComponentKind::ResourcePool, "mana"),
            &snapshot,
            &trigger(None),
        )
        .unwrap();

        assert_eq!(
            resolved,
            Some(ResolvedTarget::Pool {
                index: 1,
                field: PoolField::Current
            })
        );
    }

    #[test]
    fn test_static_miss_is_silently_skipped() {
        let snapshot = snapshot();

        let resolved = resolve_target(
            &modifier(ComponentKind::ResourcePool, "Stamina"),
            &snapshot,
            &trigger(None),
        )
        .unwrap();

        assert_eq!(resolved, None);
    }

    #[test]
    fn test_static_attribute_resolves_by_name() {
        let snapshot = snapshot();

        let resolved = resolve_target(
            &modifier(ComponentKind::Attribute, "STRENGTH"),
            &snapshot,
            &trigger(None),
        )
        .unwrap();

        assert_eq!(
            resolved,
            Some(ResolvedTarget::Attribute {
                attribute_id: Uuid::from_u128(7)
            })
        );
    }

    #[test]
    fn test_dynamic_resource_token_selects_field() {
        let snapshot = snapshot();
        let formula = parse_source_formula("expr=2;target=resource.Hit Points.max");

        let resolved = resolve_target(
            &modifier(ComponentKind::ResourcePool, DYNAMIC_PLACEHOLDER),
            &snapshot,
            &trigger(Some(&formula)),
        )
        .unwrap();

        assert_eq!(
            resolved,
            Some(ResolvedTarget::Pool {
                index: 0,
                field: PoolField::Max
            })
        );
    }

    #[test]
    fn test_dynamic_attribute_token_resolves() {
        let snapshot = snapshot();
        let formula = parse_source_formula("expr=1;target=attr.strength");

        let resolved = resolve_target(
            &modifier(ComponentKind::Attribute, DYNAMIC_PLACEHOLDER),
            &snapshot,
            &trigger(Some(&formula)),
        )
        .unwrap();

        assert_eq!(
            resolved,
            Some(ResolvedTarget::Attribute {
                attribute_id: Uuid::from_u128(7)
            })
        );
    }

    #[test]
    fn test_dynamic_without_formula_fails() {
        let snapshot = snapshot();

        let result = resolve_target(
            &modifier(ComponentKind::ResourcePool, DYNAMIC_PLACEHOLDER),
            &snapshot,
            &trigger(None),
        );

        assert!(matches!(
            result,
            Err(DomainError::UnresolvedDynamicTarget {
                source_kind: SourceKind::Item,
                ..
            })
        ));
    }

    #[test]
    fn test_dynamic_unknown_pool_fails() {
        let snapshot = snapshot();
        let formula = parse_source_formula("expr=2;target=resource.Stamina");

        let result = resolve_target(
            &modifier(ComponentKind::ResourcePool, DYNAMIC_PLACEHOLDER),
            &snapshot,
            &trigger(Some(&formula)),
        );

        assert!(matches!(
            result,
            Err(DomainError::UnresolvedDynamicTarget { .. })
        ));
    }

    #[test]
    fn test_dynamic_kind_mismatch_fails() {
        let snapshot = snapshot();
        let formula = parse_source_formula("expr=2;target=attr.strength");

        let result = resolve_target(
            &modifier(ComponentKind::ResourcePool, DYNAMIC_PLACEHOLDER),
            &snapshot,
            &trigger(Some(&formula)),
        );

        assert!(matches!(
            result,
            Err(DomainError::UnresolvedDynamicTarget { .. })
        ));
    }
}
