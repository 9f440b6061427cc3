//! Derived pool maxima from core attributes and archetype scaling.

use campaign_core::model::{Archetype, ModifierOperation, PoolField};
use serde::Serialize;

use super::pools::{AppliedChange, WellKnownPool, mutate_pool};
use super::snapshot::CharacterSnapshot;

/// Totals of the six core attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CoreAttributes {
    /// Strength.
    pub strength: i32,
    /// Dexterity.
    pub dexterity: i32,
    /// Constitution.
    pub constitution: i32,
    /// Intelligence.
    pub intelligence: i32,
    /// Wisdom.
    pub wisdom: i32,
    /// Charisma.
    pub charisma: i32,
}

impl CoreAttributes {
    /// Reads the core attribute totals from a snapshot; missing ones are zero.
    #[must_use]
    pub fn from_snapshot(snapshot: &CharacterSnapshot) -> Self {
        let total = |slug: &str| snapshot.attribute_total_by_slug(slug).unwrap_or(0);
        Self {
            strength: total("strength"),
            dexterity: total("dexterity"),
            constitution: total("constitution"),
            intelligence: total("intelligence"),
            wisdom: total("wisdom"),
            charisma: total("charisma"),
        }
    }
}

/// Archetype multipliers for the spendable pools.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchetypeScaling {
    /// Hit point scaling.
    pub hp: f64,
    /// Mana scaling.
    pub mp: f64,
    /// Technique scaling.
    pub tp: f64,
}

impl Default for ArchetypeScaling {
    fn default() -> Self {
        Self {
            hp: 1.0,
            mp: 1.0,
            tp: 1.0,
        }
    }
}

impl From<&Archetype> for ArchetypeScaling {
    fn from(archetype: &Archetype) -> Self {
        Self {
            hp: archetype.hp_scaling,
            mp: archetype.mp_scaling,
            tp: archetype.tp_scaling,
        }
    }
}

/// Target `max` values of the derived pools.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DerivedMaxima {
    /// Hit points.
    pub hp: f64,
    /// Mana.
    pub mp: f64,
    /// Technique points.
    pub tp: f64,
    /// Movement.
    pub movement: f64,
    /// Physical resistance.
    pub physical_resistance: f64,
    /// Magic resistance.
    pub magic_resistance: f64,
}

impl DerivedMaxima {
    /// Returns the maximum for one derived pool.
    #[must_use]
    pub fn get(&self, pool: WellKnownPool) -> f64 {
        match pool {
            WellKnownPool::HitPoints => self.hp,
            WellKnownPool::Mana => self.mp,
            WellKnownPool::Technique => self.tp,
            WellKnownPool::Movement => self.movement,
            WellKnownPool::PhysicalResistance => self.physical_resistance,
            WellKnownPool::MagicResistance => self.magic_resistance,
        }
    }
}

/// Computes derived maxima from attributes and scaling.
pub trait DerivedStatFormula: Send + Sync {
    /// Returns the derived maxima.
    fn compute(&self, attributes: &CoreAttributes, scaling: &ArchetypeScaling) -> DerivedMaxima;
}

/// Default formula: spendable pools weight a primary attribute double,
/// resistances average two attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchetypeWeightedFormula;

impl DerivedStatFormula for ArchetypeWeightedFormula {
    fn compute(&self, a: &CoreAttributes, scaling: &ArchetypeScaling) -> DerivedMaxima {
        let scaled = |factor: f64, primary: i32, secondary: i32| {
            (factor * f64::from(2 * primary + secondary)).round().max(0.0)
        };
        let floored = |value: i32| f64::from(value.max(0));

        DerivedMaxima {
            hp: scaled(scaling.hp, a.constitution, a.strength),
            mp: scaled(scaling.mp, a.intelligence, a.wisdom),
            tp: scaled(scaling.tp, a.dexterity, a.strength),
            movement: floored(3 + a.dexterity.div_euclid(2)),
            physical_resistance: floored((a.constitution + a.strength).div_euclid(4)),
            magic_resistance: floored((a.intelligence + a.wisdom).div_euclid(4)),
        }
    }
}

/// Brings every present derived pool's `max` in line with the formula.
/// `current` follows the at-cap rule. Returns one change per updated pool.
pub fn recompute_derived(
    snapshot: &mut CharacterSnapshot,
    formula: &dyn DerivedStatFormula,
    scaling: &ArchetypeScaling,
) -> Vec<AppliedChange> {
    let maxima = formula.compute(&CoreAttributes::from_snapshot(snapshot), scaling);

    let mut changes = Vec::new();
    for kind in WellKnownPool::DERIVED {
        let Some(index) = snapshot.well_known_pool(kind) else {
            continue;
        };
        let target = maxima.get(kind);
        if (snapshot.pool(index).max - target).abs() < f64::EPSILON {
            continue;
        }
        changes.push(mutate_pool(
            snapshot,
            index,
            PoolField::Max,
            ModifierOperation::Set,
            target,
        ));
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::model::{AttributeDefinition, CharacterAttributeValue, ResourcePool};
    use uuid::Uuid;

    fn attributes() -> CoreAttributes {
        CoreAttributes {
            strength: 3,
            dexterity: 5,
            constitution: 4,
            intelligence: 2,
            wisdom: 1,
            charisma: 0,
        }
    }

    fn snapshot(pools: &[(&str, f64, f64)], values: &[(&str, i32)]) -> CharacterSnapshot {
        let pools = pools
            .iter()
            .map(|(name, current, max)| ResourcePool {
                id: Uuid::new_v4(),
                character_id: Uuid::nil(),
                name: (*name).to_owned(),
                current: *current,
                max: *max,
                bonus: 0.0,
            })
            .collect();
        let mut catalog = Vec::new();
        let mut rows = Vec::new();
        for (name, base) in values {
            let definition = AttributeDefinition {
                id: Uuid::new_v4(),
                name: (*name).to_owned(),
            };
            rows.push(CharacterAttributeValue {
                character_id: Uuid::nil(),
                attribute_id: definition.id,
                base: *base,
                equipment_delta: 0,
                extra: 0,
            });
            catalog.push(definition);
        }
        CharacterSnapshot::new(Uuid::nil(), pools, catalog, rows)
    }

    #[test]
    fn test_weighted_formula_with_neutral_scaling() {
        let maxima = ArchetypeWeightedFormula.compute(&attributes(), &ArchetypeScaling::default());

        assert!((maxima.hp - 11.0).abs() < f64::EPSILON);
        assert!((maxima.mp - 5.0).abs() < f64::EPSILON);
        assert!((maxima.tp - 13.0).abs() < f64::EPSILON);
        assert!((maxima.movement - 5.0).abs() < f64::EPSILON);
        assert!((maxima.physical_resistance - 1.0).abs() < f64::EPSILON);
        assert!(maxima.magic_resistance.abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_formula_applies_archetype_scaling() {
        let scaling = ArchetypeScaling {
            hp: 1.5,
            mp: 0.5,
            tp: 2.0,
        };

        let maxima = ArchetypeWeightedFormula.compute(&attributes(), &scaling);

        assert!((maxima.hp - 17.0).abs() < f64::EPSILON);
        assert!((maxima.mp - 3.0).abs() < f64::EPSILON);
        assert!((maxima.tp - 26.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_weighted_formula_floors_at_zero() {
        let weak = CoreAttributes {
            strength: -4,
            dexterity: -9,
            constitution: -3,
            ..CoreAttributes::default()
        };

        let maxima = ArchetypeWeightedFormula.compute(&weak, &ArchetypeScaling::default());

        assert!(maxima.hp.abs() < f64::EPSILON);
        assert!(maxima.movement.abs() < f64::EPSILON);
        assert!(maxima.physical_resistance.abs() < f64::EPSILON);
    }

    #[test]
    fn test_core_attributes_read_by_slug() {
        let snapshot = snapshot(&[], &[("Strength", 3), ("Wisdom", 2)]);

        let core = CoreAttributes::from_snapshot(&snapshot);

        assert_eq!(core.strength, 3);
        assert_eq!(core.wisdom, 2);
        assert_eq!(core.dexterity, 0);
    }

    #[test]
    fn test_recompute_keeps_full_pool_full_and_skips_unchanged() {
        // Arrange: CON 4, STR 3 => HP max 11, MOV max 3.
        let mut snapshot = snapshot(
            &[("HP", 10.0, 10.0), ("MP", 1.0, 8.0), ("Movement", 2.0, 3.0)],
            &[("Strength", 3), ("Constitution", 4)],
        );

        // Act
        let changes = recompute_derived(
            &mut snapshot,
            &ArchetypeWeightedFormula,
            &ArchetypeScaling::default(),
        );

        // Assert
        assert_eq!(changes.len(), 2);
        assert!((snapshot.pool(0).max - 11.0).abs() < f64::EPSILON);
        assert!((snapshot.pool(0).current - 11.0).abs() < f64::EPSILON);
        assert!(snapshot.pool(1).max.abs() < f64::EPSILON);
        assert!(snapshot.pool(1).current.abs() < f64::EPSILON);
        assert!((snapshot.pool(2).current - 2.0).abs() < f64::EPSILON);
        let writes = snapshot.pool_writes();
        assert_eq!(writes.len(), 2);
    }
}
