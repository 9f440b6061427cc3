//! Commands accepted by the effect engine.

use campaign_core::command::Command;
use campaign_core::model::SourceKind;
use uuid::Uuid;

/// Command to apply an effect to a character.
#[derive(Debug, Clone)]
pub struct ApplyEffect {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affected character.
    pub character_id: Uuid,
    /// The effect to apply.
    pub effect_id: Uuid,
    /// Kind of the triggering source.
    pub source_kind: SourceKind,
    /// The triggering item or skill, if any.
    pub source_id: Option<Uuid>,
    /// Turn the application happens on.
    pub current_turn: i32,
    /// Requested duration; the effect's base duration is used when absent or
    /// not positive.
    pub duration: Option<i32>,
    /// Requested stack change.
    pub stacks_delta: i32,
    /// Magnitude per stack; negative for damage.
    pub value_per_stack: f64,
}

impl Command for ApplyEffect {
    fn command_type(&self) -> &'static str {
        "effects.apply_effect"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to apply an effect whose magnitude comes from a dice roll.
#[derive(Debug, Clone)]
pub struct ApplyRolledEffect {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The affected character.
    pub character_id: Uuid,
    /// The effect to apply.
    pub effect_id: Uuid,
    /// Kind of the triggering source.
    pub source_kind: SourceKind,
    /// The triggering item or skill, if any.
    pub source_id: Option<Uuid>,
    /// Turn the application happens on.
    pub current_turn: i32,
    /// Requested duration.
    pub duration: Option<i32>,
    /// Requested stack change.
    pub stacks_delta: i32,
    /// Dice expression, e.g. `2d6+3`.
    pub expression: String,
    /// When set, the rolled total is applied as a negative magnitude.
    pub harmful: bool,
}

impl Command for ApplyRolledEffect {
    fn command_type(&self) -> &'static str {
        "effects.apply_rolled_effect"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to advance one applied effect instance by a turn.
#[derive(Debug, Clone)]
pub struct AdvanceEffect {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The instance to advance.
    pub instance_id: Uuid,
}

impl Command for AdvanceEffect {
    fn command_type(&self) -> &'static str {
        "effects.advance_effect"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to advance every live instance by a turn.
#[derive(Debug, Clone)]
pub struct AdvanceAllEffects {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
}

impl Command for AdvanceAllEffects {
    fn command_type(&self) -> &'static str {
        "effects.advance_all_effects"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to advance one character's live instances by a turn.
#[derive(Debug, Clone)]
pub struct AdvanceCharacterEffects {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character whose instances advance.
    pub character_id: Uuid,
}

impl Command for AdvanceCharacterEffects {
    fn command_type(&self) -> &'static str {
        "effects.advance_character_effects"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to equip or unequip an inventory entry.
#[derive(Debug, Clone)]
pub struct SetEquipped {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The inventory entry.
    pub entry_id: Uuid,
    /// Desired equipped flag.
    pub equipped: bool,
}

impl Command for SetEquipped {
    fn command_type(&self) -> &'static str {
        "effects.set_equipped"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to fold duplicate equipped entries of one slot into one.
#[derive(Debug, Clone)]
pub struct MergeEquippedDuplicates {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning character.
    pub character_id: Uuid,
    /// The slot to clean up.
    pub slot: String,
}

impl Command for MergeEquippedDuplicates {
    fn command_type(&self) -> &'static str {
        "effects.merge_equipped_duplicates"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to recompute a character's derived pool maxima.
#[derive(Debug, Clone)]
pub struct RecomputeDerivedStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The character to recompute.
    pub character_id: Uuid,
}

impl Command for RecomputeDerivedStatus {
    fn command_type(&self) -> &'static str {
        "effects.recompute_derived_status"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
