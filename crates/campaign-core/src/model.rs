//! Records shared between the effect engine and its storage adapters.
//!
//! These mirror the rows the catalog and character sheet own. The engine
//! reads catalog records and writes pools, attribute rows, applied effect
//! instances, and inventory entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Modifier name that defers target resolution to the triggering source.
pub const DYNAMIC_PLACEHOLDER: &str = "@dynamic";

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the stored text form.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    other => Err(DomainError::Validation(format!(
                        "unknown {} '{other}'",
                        stringify!($name)
                    ))),
                }
            }
        }
    };
}

/// Damage classification used for resistance mitigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageType {
    /// Not damage; never mitigated.
    #[default]
    None,
    /// Mitigated by physical resistance.
    Physical,
    /// Mitigated by magic resistance.
    Magic,
}

text_enum!(DamageType {
    None => "NONE",
    Physical => "PHYSICAL",
    Magic => "MAGIC",
});

/// How a reapplied timed effect combines with its live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackingPolicy {
    /// Discard the old instance state and start fresh.
    #[default]
    Replace,
    /// Keep stacks, renew the duration window.
    Refresh,
    /// Accumulate stacks, extend the duration window.
    Stack,
}

text_enum!(StackingPolicy {
    Replace => "REPLACE",
    Refresh => "REFRESH",
    Stack => "STACK",
});

/// What kind of source triggered an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// An item (`ItemHasEffect` links).
    Item,
    /// A skill or ability (`AbilityEffect` links).
    Skill,
    /// Anything else; has no source links.
    Other,
}

text_enum!(SourceKind {
    Item => "ITEM",
    Skill => "SKILL",
    Other => "OTHER",
});

/// Which kind of character component a modifier touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentKind {
    /// A named resource pool ("status").
    ResourcePool,
    /// A named attribute.
    Attribute,
}

text_enum!(ComponentKind {
    ResourcePool => "RESOURCE_POOL",
    Attribute => "ATTRIBUTE",
});

/// Arithmetic a modifier performs on its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModifierOperation {
    /// `value + delta`
    Add,
    /// `value * delta`
    Multiply,
    /// `delta`
    Set,
}

text_enum!(ModifierOperation {
    Add => "ADD",
    Multiply => "MULTIPLY",
    Set => "SET",
});

/// One of the three numeric fields of a resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolField {
    /// The spendable value.
    #[default]
    Current,
    /// The base capacity.
    Max,
    /// Capacity on top of `max`.
    Bonus,
}

impl PoolField {
    /// Returns the lower-case field name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Max => "max",
            Self::Bonus => "bonus",
        }
    }
}

impl fmt::Display for PoolField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry describing a damage/buff/debuff template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectDefinition {
    /// Effect identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Damage classification.
    pub damage_type: DamageType,
    /// Reapplication policy.
    pub stacking_policy: StackingPolicy,
    /// Duration used when the caller supplies none.
    pub base_duration_turns: i32,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Target declarations.
    pub modifiers: Vec<EffectModifier>,
}

/// One target declaration of an effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectModifier {
    /// Modifier identifier.
    pub id: Uuid,
    /// Kind of component touched.
    pub component_kind: ComponentKind,
    /// Literal component name or [`DYNAMIC_PLACEHOLDER`].
    pub component_name: String,
    /// Arithmetic performed.
    pub operation: ModifierOperation,
}

impl EffectModifier {
    /// Returns `true` when the target is resolved from the triggering source.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        self.component_name
            .trim()
            .eq_ignore_ascii_case(DYNAMIC_PLACEHOLDER)
    }
}

/// A live or retired per-character occurrence of a timed effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedEffectInstance {
    /// Instance identifier.
    pub id: Uuid,
    /// Affected character.
    pub character_id: Uuid,
    /// Applied effect.
    pub effect_id: Uuid,
    /// Kind of source that applied it.
    pub source_kind: SourceKind,
    /// Concrete source, when known.
    pub source_id: Option<Uuid>,
    /// Turns left before retirement.
    pub duration_remaining: i32,
    /// Turn the current window started.
    pub started_at_turn: i32,
    /// Last turn of the current window.
    pub expires_at_turn: i32,
    /// Stack count, always at least one.
    pub stacks: i32,
    /// `stacks * value_per_stack` at the last application.
    pub cached_magnitude: f64,
    /// Soft-delete marker; set once the instance is retired.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AppliedEffectInstance {
    /// Returns `true` while the instance has not been retired.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A named character resource ("status") such as HP or MP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    /// Pool identifier.
    pub id: Uuid,
    /// Owning character.
    pub character_id: Uuid,
    /// Display name.
    pub name: String,
    /// Spendable value.
    pub current: f64,
    /// Base capacity.
    pub max: f64,
    /// Extra capacity.
    pub bonus: f64,
}

impl ResourcePool {
    /// Combined capacity, `max + bonus`.
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.max + self.bonus
    }

    /// Reads one field.
    #[must_use]
    pub fn field(&self, field: PoolField) -> f64 {
        match field {
            PoolField::Current => self.current,
            PoolField::Max => self.max,
            PoolField::Bonus => self.bonus,
        }
    }

    /// Writes one field without any clamping.
    pub fn set_field(&mut self, field: PoolField, value: f64) {
        match field {
            PoolField::Current => self.current = value,
            PoolField::Max => self.max = value,
            PoolField::Bonus => self.bonus = value,
        }
    }
}

/// A changed subset of one pool's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolWrite {
    /// Pool identifier.
    pub pool_id: Uuid,
    /// New `current`, when changed.
    pub current: Option<f64>,
    /// New `max`, when changed.
    pub max: Option<f64>,
    /// New `bonus`, when changed.
    pub bonus: Option<f64>,
}

impl PoolWrite {
    /// Applies the changed fields to `pool`.
    pub fn apply_to(&self, pool: &mut ResourcePool) {
        if let Some(current) = self.current {
            pool.current = current;
        }
        if let Some(max) = self.max {
            pool.max = max;
        }
        if let Some(bonus) = self.bonus {
            pool.bonus = bonus;
        }
    }
}

/// Attribute catalog row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Attribute identifier.
    pub id: Uuid,
    /// Display name, e.g. "Physical Resistance".
    pub name: String,
}

/// A character's value for one attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterAttributeValue {
    /// Owning character.
    pub character_id: Uuid,
    /// Attribute identifier.
    pub attribute_id: Uuid,
    /// Sheet value.
    pub base: i32,
    /// Accumulated equipment and effect deltas.
    pub equipment_delta: i32,
    /// Other bonus.
    pub extra: i32,
}

impl CharacterAttributeValue {
    /// Effective value, `base + equipment_delta + extra`.
    #[must_use]
    pub fn total(&self) -> i32 {
        self.base + self.equipment_delta + self.extra
    }
}

/// Per-source specialisation of an effect (`ItemHasEffect` / `AbilityEffect`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEffectLink {
    /// Kind of the source.
    pub source_kind: SourceKind,
    /// Item or ability identifier.
    pub source_id: Uuid,
    /// Linked effect.
    pub effect_id: Uuid,
    /// Expression and optional dynamic target, see the formula parser.
    pub formula: String,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Character header the engine needs for derived recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Character identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Archetype, when one was chosen.
    pub archetype_id: Option<Uuid>,
}

/// Archetype scaling factors for derived pools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archetype {
    /// Archetype identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Hit point scaling.
    pub hp_scaling: f64,
    /// Mana scaling.
    pub mp_scaling: f64,
    /// Technique scaling.
    pub tp_scaling: f64,
}

/// A character's link to an item in their inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// Entry identifier.
    pub id: Uuid,
    /// Owning character.
    pub character_id: Uuid,
    /// Linked item.
    pub item_id: Uuid,
    /// Equipment slot of the item, if it is equippable.
    pub slot: Option<String>,
    /// Stack size.
    pub quantity: i32,
    /// Whether the entry is currently equipped.
    pub equipped: bool,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl InventoryEntry {
    /// Returns `true` while the entry has not been soft-deleted.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}
