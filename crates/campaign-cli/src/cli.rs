//! Command-line surface.

use campaign_core::model::SourceKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use uuid::Uuid;

/// Operator tools for the campaign effect engine
#[derive(Parser, Debug)]
#[command(name = "campaign")]
#[command(about = "Operator tools for the campaign effect engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,

    /// Apply an effect to a character
    ApplyEffect(ApplyEffectArgs),

    /// Advance one applied effect by a turn
    AdvanceEffect(AdvanceEffectArgs),

    /// Advance live applied effects by a turn
    AdvanceTurn(AdvanceTurnArgs),

    /// Equip an inventory entry and apply its item effects
    Equip(EntryArgs),

    /// Unequip an inventory entry and reverse its item effects
    Unequip(EntryArgs),

    /// Fold duplicate equipped entries of a slot into one
    MergeSlot(MergeSlotArgs),

    /// Recompute derived pool maxima of a character
    Recompute(CharacterArgs),

    /// Show a character's pools and attributes
    Status(CharacterArgs),

    /// List a character's live applied effects
    Effects(CharacterArgs),
}

/// Source kind accepted on the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceArg {
    Item,
    Skill,
    Other,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Item => Self::Item,
            SourceArg::Skill => Self::Skill,
            SourceArg::Other => Self::Other,
        }
    }
}

#[derive(Args, Debug)]
pub struct ApplyEffectArgs {
    /// Affected character
    #[arg(long)]
    pub character: Uuid,

    /// Effect to apply
    #[arg(long)]
    pub effect: Uuid,

    /// Kind of the triggering source
    #[arg(long, value_enum, default_value_t = SourceArg::Other)]
    pub source_kind: SourceArg,

    /// Triggering item or skill
    #[arg(long)]
    pub source: Option<Uuid>,

    /// Current game turn
    #[arg(long, default_value_t = 0)]
    pub turn: i32,

    /// Duration in turns; the effect's base duration when omitted
    #[arg(long, allow_negative_numbers = true)]
    pub duration: Option<i32>,

    /// Stack change
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub stacks: i32,

    /// Magnitude per stack; negative for damage
    #[arg(
        long,
        allow_negative_numbers = true,
        conflicts_with = "roll",
        required_unless_present = "roll"
    )]
    pub value: Option<f64>,

    /// Dice expression rolled for the magnitude, e.g. 2d6+3
    #[arg(long)]
    pub roll: Option<String>,

    /// Apply the rolled total as a negative magnitude
    #[arg(long, requires = "roll")]
    pub harmful: bool,
}

#[derive(Args, Debug)]
pub struct AdvanceEffectArgs {
    /// Applied effect instance
    #[arg(long)]
    pub instance: Uuid,
}

#[derive(Args, Debug)]
pub struct AdvanceTurnArgs {
    /// Only advance this character's effects
    #[arg(long)]
    pub character: Option<Uuid>,
}

#[derive(Args, Debug)]
pub struct EntryArgs {
    /// Inventory entry
    #[arg(long)]
    pub entry: Uuid,
}

#[derive(Args, Debug)]
pub struct MergeSlotArgs {
    /// Owning character
    #[arg(long)]
    pub character: Uuid,

    /// Equipment slot
    #[arg(long)]
    pub slot: String,
}

#[derive(Args, Debug)]
pub struct CharacterArgs {
    /// Character
    #[arg(long)]
    pub character: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_effect_parses_negative_value() {
        let character = Uuid::new_v4();
        let effect = Uuid::new_v4();

        let cli = Cli::try_parse_from([
            "campaign",
            "apply-effect",
            "--character",
            &character.to_string(),
            "--effect",
            &effect.to_string(),
            "--value",
            "-8",
            "--source-kind",
            "skill",
        ])
        .unwrap();

        let Command::ApplyEffect(args) = cli.command else {
            panic!("expected apply-effect");
        };
        assert_eq!(args.character, character);
        assert_eq!(args.value, Some(-8.0));
        assert_eq!(args.stacks, 1);
        assert_eq!(SourceKind::from(args.source_kind), SourceKind::Skill);
    }

    #[test]
    fn test_apply_effect_requires_value_or_roll() {
        let result = Cli::try_parse_from([
            "campaign",
            "apply-effect",
            "--character",
            &Uuid::new_v4().to_string(),
            "--effect",
            &Uuid::new_v4().to_string(),
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_harmful_requires_roll() {
        let result = Cli::try_parse_from([
            "campaign",
            "apply-effect",
            "--character",
            &Uuid::new_v4().to_string(),
            "--effect",
            &Uuid::new_v4().to_string(),
            "--value",
            "3",
            "--harmful",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_advance_turn_character_is_optional() {
        let cli = Cli::try_parse_from(["campaign", "advance-turn"]).unwrap();

        assert!(matches!(
            cli.command,
            Command::AdvanceTurn(AdvanceTurnArgs { character: None })
        ));
    }

    #[test]
    fn test_rejects_malformed_uuid() {
        let result = Cli::try_parse_from(["campaign", "status", "--character", "not-a-uuid"]);

        assert!(result.is_err());
    }
}
