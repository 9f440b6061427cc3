//! Resource pool bounds and the single mutation primitive every engine path
//! goes through.

use campaign_core::model::{ModifierOperation, PoolField, ResourcePool};
use serde::Serialize;

use super::formula::normalize_key;
use super::snapshot::CharacterSnapshot;

/// Pools the engine recognises by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownPool {
    /// Hit points.
    HitPoints,
    /// Mana points.
    Mana,
    /// Technique points.
    Technique,
    /// Movement.
    Movement,
    /// Physical resistance.
    PhysicalResistance,
    /// Magic resistance.
    MagicResistance,
}

impl WellKnownPool {
    /// Pools whose `max` is derived from attributes and archetype.
    pub const DERIVED: [Self; 6] = [
        Self::HitPoints,
        Self::Mana,
        Self::Technique,
        Self::Movement,
        Self::PhysicalResistance,
        Self::MagicResistance,
    ];

    /// Normalized names that identify the pool.
    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::HitPoints => &["hp", "hitpoints", "health", "vida"],
            Self::Mana => &["mp", "mana", "manapoints"],
            Self::Technique => &["tp", "techniquepoints"],
            Self::Movement => &["mov", "movement"],
            Self::PhysicalResistance => &["rf", "physicalresistance"],
            Self::MagicResistance => &["rm", "magicresistance"],
        }
    }

    /// Returns `true` when `name` identifies this pool.
    #[must_use]
    pub fn matches(self, name: &str) -> bool {
        let key = normalize_key(name);
        self.aliases().contains(&key.as_str())
    }
}

/// Outcome of one pool mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedChange {
    /// Pool name, suffixed with the field when it is not `current`.
    pub target_label: String,
    /// Requested change before clamping.
    pub delta: f64,
    /// Field value before the mutation.
    pub initial_value: f64,
    /// Field value after clamping.
    pub final_value: f64,
}

/// Clamps a new field value to the pool invariant.
///
/// `current` is bounded by `[0, max + bonus]`, except for hit points, which
/// are bounded above only. `max` and `bonus` are bounded below by zero.
#[must_use]
pub fn clamp_field(pool: &ResourcePool, field: PoolField, value: f64, hit_points: bool) -> f64 {
    match field {
        PoolField::Current => {
            let capacity = pool.capacity();
            if hit_points {
                // HP has no lower bound: negative values record overkill and
                // downstream death handling reads them. Do not clamp at zero.
                value.min(capacity)
            } else {
                value.min(capacity).max(0.0)
            }
        }
        PoolField::Max | PoolField::Bonus => value.max(0.0),
    }
}

/// At-cap preservation: a pool that was full before a capacity change stays
/// full afterwards; otherwise `current` only moves if it no longer fits.
#[must_use]
pub fn preserve_at_cap(current: f64, old_capacity: f64, new_capacity: f64) -> f64 {
    if current >= old_capacity || current > new_capacity {
        new_capacity
    } else {
        current
    }
}

/// Applies `operation` with `operand` to one field of the pool at `index`,
/// clamps the result, and re-clamps `current` when the capacity moved.
pub fn mutate_pool(
    snapshot: &mut CharacterSnapshot,
    index: usize,
    field: PoolField,
    operation: ModifierOperation,
    operand: f64,
) -> AppliedChange {
    let hit_points = snapshot.is_hit_points(index);
    let pool = snapshot.pool_mut(index);

    let initial_value = pool.field(field);
    let (raw, delta) = match operation {
        ModifierOperation::Add => (initial_value + operand, operand),
        ModifierOperation::Multiply => {
            let value = initial_value * operand;
            (value, value - initial_value)
        }
        ModifierOperation::Set => (operand, operand - initial_value),
    };

    let old_capacity = pool.capacity();
    let final_value = clamp_field(pool, field, raw, hit_points);
    pool.set_field(field, final_value);

    if field != PoolField::Current {
        let current = preserve_at_cap(pool.current, old_capacity, pool.capacity());
        pool.current = if hit_points { current } else { current.max(0.0) };
    }

    let target_label = match field {
        PoolField::Current => pool.name.clone(),
        other => format!("{}.{other}", pool.name),
    };

    AppliedChange {
        target_label,
        delta,
        initial_value,
        final_value,
    }
}
