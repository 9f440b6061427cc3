//! Damage mitigation from resistance pools or attributes.

use campaign_core::model::DamageType;

use super::pools::WellKnownPool;
use super::snapshot::CharacterSnapshot;

/// Returns the non-negative mitigation a character has against
/// `damage_type`.
///
/// A dedicated resistance pool wins and contributes
/// `max(current, max) + bonus`; otherwise the matching attribute total is
/// used; otherwise zero.
#[must_use]
pub fn mitigation(snapshot: &CharacterSnapshot, damage_type: DamageType) -> f64 {
    let (pool_kind, attribute_slug) = match damage_type {
        DamageType::Physical => (WellKnownPool::PhysicalResistance, "physical_resistance"),
        DamageType::Magic => (WellKnownPool::MagicResistance, "magic_resistance"),
        DamageType::None => return 0.0,
    };

    if let Some(index) = snapshot.well_known_pool(pool_kind) {
        let pool = snapshot.pool(index);
        return (pool.current.max(pool.max) + pool.bonus).max(0.0);
    }

    snapshot
        .attribute_total_by_slug(attribute_slug)
        .map_or(0.0, |total| f64::from(total.max(0)))
}
