//! In-transaction view of one character's sheet.
//!
//! Pools live in an arena addressed by index; name lookups go through a
//! normalized-key index. Writes are collected as diffs against the loaded
//! rows so only changed fields reach the store.

use std::collections::HashMap;

use campaign_core::model::{
    AttributeDefinition, CharacterAttributeValue, PoolWrite, ResourcePool,
};
use uuid::Uuid;

use super::formula::{normalize_key, slugify};
use super::pools::WellKnownPool;

/// A pending change to an attribute row's `equipment_delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeDelta {
    /// Attribute identifier.
    pub attribute_id: Uuid,
    /// Amount to add.
    pub delta: i32,
}

/// Pools, attributes and pending writes of one character.
#[derive(Debug, Clone)]
pub struct CharacterSnapshot {
    character_id: Uuid,
    pools: Vec<ResourcePool>,
    originals: Vec<ResourcePool>,
    pool_index: HashMap<String, usize>,
    catalog: Vec<AttributeDefinition>,
    attribute_index: HashMap<String, usize>,
    values: HashMap<Uuid, CharacterAttributeValue>,
    attribute_deltas: Vec<AttributeDelta>,
}

impl CharacterSnapshot {
    /// Builds the snapshot from loaded rows.
    ///
    /// When two pools normalize to the same key the first one wins.
    #[must_use]
    pub fn new(
        character_id: Uuid,
        pools: Vec<ResourcePool>,
        catalog: Vec<AttributeDefinition>,
        values: Vec<CharacterAttributeValue>,
    ) -> Self {
        let mut pool_index = HashMap::new();
        for (index, pool) in pools.iter().enumerate() {
            pool_index.entry(normalize_key(&pool.name)).or_insert(index);
        }

        let mut attribute_index = HashMap::new();
        for (index, attribute) in catalog.iter().enumerate() {
            attribute_index
                .entry(slugify(&attribute.name))
                .or_insert(index);
        }

        let values = values
            .into_iter()
            .map(|value| (value.attribute_id, value))
            .collect();

        Self {
            character_id,
            originals: pools.clone(),
            pools,
            pool_index,
            catalog,
            attribute_index,
            values,
            attribute_deltas: Vec::new(),
        }
    }

    /// Returns the character this snapshot belongs to.
    #[must_use]
    pub fn character_id(&self) -> Uuid {
        self.character_id
    }

    /// Returns every pool in load order.
    #[must_use]
    pub fn pools(&self) -> &[ResourcePool] {
        &self.pools
    }

    /// Returns the pool at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` did not come from this snapshot.
    #[must_use]
    pub fn pool(&self, index: usize) -> &ResourcePool {
        &self.pools[index]
    }

    pub(crate) fn pool_mut(&mut self, index: usize) -> &mut ResourcePool {
        &mut self.pools[index]
    }

    /// Finds a pool by name, ignoring case, whitespace, punctuation and
    /// diacritics.
    #[must_use]
    pub fn find_pool(&self, name: &str) -> Option<usize> {
        let key = normalize_key(name);
        if key.is_empty() {
            return None;
        }
        self.pool_index.get(&key).copied()
    }

    /// Finds a well-known pool through any of its aliases.
    #[must_use]
    pub fn well_known_pool(&self, kind: WellKnownPool) -> Option<usize> {
        kind.aliases()
            .iter()
            .find_map(|alias| self.pool_index.get(*alias).copied())
    }

    /// Returns `true` when the pool at `index` is the hit point pool.
    #[must_use]
    pub fn is_hit_points(&self, index: usize) -> bool {
        WellKnownPool::HitPoints.matches(&self.pools[index].name)
    }

    /// Finds an attribute by name or slug.
    #[must_use]
    pub fn find_attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        let slug = slugify(name);
        if slug.is_empty() {
            return None;
        }
        self.attribute_index
            .get(&slug)
            .map(|&index| &self.catalog[index])
    }

    /// Returns the attribute catalog.
    #[must_use]
    pub fn catalog(&self) -> &[AttributeDefinition] {
        &self.catalog
    }

    /// Returns the character's row for an attribute, if one exists.
    #[must_use]
    pub fn attribute_value(&self, attribute_id: Uuid) -> Option<&CharacterAttributeValue> {
        self.values.get(&attribute_id)
    }

    /// Effective value of an attribute; zero when the character has no row.
    #[must_use]
    pub fn attribute_total(&self, attribute_id: Uuid) -> i32 {
        self.values
            .get(&attribute_id)
            .map_or(0, CharacterAttributeValue::total)
    }

    /// Effective value of an attribute addressed by slug.
    #[must_use]
    pub fn attribute_total_by_slug(&self, slug: &str) -> Option<i32> {
        self.find_attribute(slug)
            .map(|attribute| self.attribute_total(attribute.id))
    }

    /// Adds `delta` to an attribute's `equipment_delta`, creating the row
    /// when absent, and records the change for persistence.
    pub fn add_equipment_delta(&mut self, attribute_id: Uuid, delta: i32) {
        let character_id = self.character_id;
        let value = self
            .values
            .entry(attribute_id)
            .or_insert_with(|| CharacterAttributeValue {
                character_id,
                attribute_id,
                base: 0,
                equipment_delta: 0,
                extra: 0,
            });
        value.equipment_delta += delta;
        self.attribute_deltas.push(AttributeDelta {
            attribute_id,
            delta,
        });
    }

    /// Attribute changes recorded since the snapshot was built.
    #[must_use]
    pub fn attribute_deltas(&self) -> &[AttributeDelta] {
        &self.attribute_deltas
    }

    /// Pools whose fields differ from the loaded rows, reduced to the
    /// changed fields.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn pool_writes(&self) -> Vec<PoolWrite> {
        self.pools
            .iter()
            .zip(&self.originals)
            .filter_map(|(pool, original)| {
                let changed = |now: f64, before: f64| (now != before).then_some(now);
                let write = PoolWrite {
                    pool_id: pool.id,
                    current: changed(pool.current, original.current),
                    max: changed(pool.max, original.max),
                    bonus: changed(pool.bonus, original.bonus),
                };
                (write.current.is_some() || write.max.is_some() || write.bonus.is_some())
                    .then_some(write)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(name: &str, current: f64) -> ResourcePool {
        ResourcePool {
            id: Uuid::new_v4(),
            character_id: Uuid::nil(),
            name: name.to_owned(),
            current,
            max: 20.0,
            bonus: 0.0,
        }
    }

    fn attribute(name: &str) -> AttributeDefinition {
        AttributeDefinition {
            id: Uuid::new_v4(),
            name: name.to_owned(),
        }
    }

    #[test]
    fn test_find_pool_normalizes_names() {
        let snapshot = CharacterSnapshot::new(
            Uuid::nil(),
            vec![pool("Hit Points", 10.0), pool("Mana", 5.0)],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(snapshot.find_pool("hit-points"), Some(0));
        assert_eq!(snapshot.find_pool("MANÁ"), Some(1));
        assert_eq!(snapshot.find_pool("TP"), None);
        assert_eq!(snapshot.find_pool("  "), None);
    }

    #[test]
    fn test_duplicate_pool_names_resolve_to_first() {
        let snapshot = CharacterSnapshot::new(
            Uuid::nil(),
            vec![pool("MP", 1.0), pool("mp", 2.0)],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(snapshot.find_pool("MP"), Some(0));
    }

    #[test]
    fn test_well_known_pool_uses_any_alias() {
        let snapshot = CharacterSnapshot::new(
            Uuid::nil(),
            vec![pool("Mana", 5.0), pool("Health", 10.0)],
            Vec::new(),
            Vec::new(),
        );

        assert_eq!(snapshot.well_known_pool(WellKnownPool::HitPoints), Some(1));
        assert_eq!(snapshot.well_known_pool(WellKnownPool::Mana), Some(0));
        assert_eq!(snapshot.well_known_pool(WellKnownPool::Movement), None);
        assert!(snapshot.is_hit_points(1));
        assert!(!snapshot.is_hit_points(0));
    }

    #[test]
    fn test_find_attribute_by_slug_or_name() {
        let strength = attribute("Strength");
        let resistance = attribute("Physical Resistance");
        let snapshot = CharacterSnapshot::new(
            Uuid::nil(),
            Vec::new(),
            vec![strength.clone(), resistance.clone()],
            Vec::new(),
        );

        assert_eq!(snapshot.find_attribute("strength"), Some(&strength));
        assert_eq!(
            snapshot.find_attribute("physical_resistance"),
            Some(&resistance)
        );
        assert_eq!(snapshot.find_attribute("Luck"), None);
    }

    #[test]
    fn test_add_equipment_delta_creates_missing_row() {
        let strength = attribute("Strength");
        let mut snapshot =
            CharacterSnapshot::new(Uuid::nil(), Vec::new(), vec![strength.clone()], Vec::new());

        snapshot.add_equipment_delta(strength.id, 2);
        snapshot.add_equipment_delta(strength.id, 1);

        assert_eq!(snapshot.attribute_total(strength.id), 3);
        assert_eq!(snapshot.attribute_total_by_slug("strength"), Some(3));
        assert_eq!(snapshot.attribute_deltas().len(), 2);
    }

    #[test]
    fn test_pool_writes_contain_only_changed_fields() {
        let mut snapshot = CharacterSnapshot::new(
            Uuid::nil(),
            vec![pool("HP", 10.0), pool("MP", 5.0)],
            Vec::new(),
            Vec::new(),
        );
        snapshot.pool_mut(1).current = 3.0;

        let writes = snapshot.pool_writes();

        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].pool_id, snapshot.pool(1).id);
        assert_eq!(writes[0].current, Some(3.0));
        assert_eq!(writes[0].max, None);
        assert_eq!(writes[0].bonus, None);
    }
}
