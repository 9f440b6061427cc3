//! Dispatch of parsed subcommands to the effect engine.

use campaign_core::error::DomainError;
use campaign_effects::application::{command_handlers, query_handlers};
use campaign_effects::domain::commands::{
    AdvanceAllEffects, AdvanceCharacterEffects, AdvanceEffect, ApplyEffect, ApplyRolledEffect,
    MergeEquippedDuplicates, RecomputeDerivedStatus, SetEquipped,
};
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::cli::{ApplyEffectArgs, Command};
use crate::error::AppError;
use crate::state::AppState;

/// Runs `command` against `state` and returns its result as JSON.
///
/// # Errors
///
/// Returns `AppError` if the engine rejects the operation or the store fails.
#[instrument(skip_all)]
pub async fn execute(command: Command, state: &AppState) -> Result<Value, AppError> {
    let store = state.store.as_ref();
    let clock = state.clock.as_ref();
    let notifier = state.notifier.as_ref();
    let formula = state.formula.as_ref();

    let value = match command {
        Command::Migrate => {
            campaign_store::migrations::run_migrations(&state.db_pool).await?;
            serde_json::json!({ "migrated": true })
        }
        Command::ApplyEffect(args) => apply_effect(args, state).await?,
        Command::AdvanceEffect(args) => {
            let command = AdvanceEffect {
                correlation_id: Uuid::new_v4(),
                instance_id: args.instance,
            };
            let instance = command_handlers::handle_advance_effect(&command, clock, store).await?;
            serde_json::to_value(instance)?
        }
        Command::AdvanceTurn(args) => {
            let summary = match args.character {
                Some(character_id) => {
                    let command = AdvanceCharacterEffects {
                        correlation_id: Uuid::new_v4(),
                        character_id,
                    };
                    command_handlers::handle_advance_character_effects(&command, clock, store)
                        .await?
                }
                None => {
                    let command = AdvanceAllEffects {
                        correlation_id: Uuid::new_v4(),
                    };
                    command_handlers::handle_advance_all_effects(&command, clock, store).await?
                }
            };
            serde_json::to_value(summary)?
        }
        Command::Equip(args) => {
            let command = SetEquipped {
                correlation_id: Uuid::new_v4(),
                entry_id: args.entry,
                equipped: true,
            };
            serde_json::to_value(
                command_handlers::handle_set_equipped(&command, clock, formula, store, notifier)
                    .await?,
            )?
        }
        Command::Unequip(args) => {
            let command = SetEquipped {
                correlation_id: Uuid::new_v4(),
                entry_id: args.entry,
                equipped: false,
            };
            serde_json::to_value(
                command_handlers::handle_set_equipped(&command, clock, formula, store, notifier)
                    .await?,
            )?
        }
        Command::MergeSlot(args) => {
            let command = MergeEquippedDuplicates {
                correlation_id: Uuid::new_v4(),
                character_id: args.character,
                slot: args.slot,
            };
            serde_json::to_value(
                command_handlers::handle_merge_equipped_duplicates(
                    &command, clock, formula, store, notifier,
                )
                .await?,
            )?
        }
        Command::Recompute(args) => {
            let command = RecomputeDerivedStatus {
                correlation_id: Uuid::new_v4(),
                character_id: args.character,
            };
            let changes = command_handlers::handle_recompute_derived_status(
                &command, clock, formula, store, notifier,
            )
            .await?;
            serde_json::to_value(changes)?
        }
        Command::Status(args) => {
            serde_json::to_value(query_handlers::get_status_sheet(args.character, store).await?)?
        }
        Command::Effects(args) => serde_json::to_value(
            query_handlers::get_active_effects(args.character, store).await?,
        )?,
    };
    Ok(value)
}

async fn apply_effect(args: ApplyEffectArgs, state: &AppState) -> Result<Value, AppError> {
    let store = state.store.as_ref();
    let clock = state.clock.as_ref();
    let notifier = state.notifier.as_ref();

    if let Some(expression) = args.roll {
        let command = ApplyRolledEffect {
            correlation_id: Uuid::new_v4(),
            character_id: args.character,
            effect_id: args.effect,
            source_kind: args.source_kind.into(),
            source_id: args.source,
            current_turn: args.turn,
            duration: args.duration,
            stacks_delta: args.stacks,
            expression,
            harmful: args.harmful,
        };
        let applied = command_handlers::handle_apply_rolled_effect(
            &command,
            clock,
            state.dice.as_ref(),
            store,
            notifier,
        )
        .await?;
        return Ok(serde_json::to_value(applied)?);
    }

    let value_per_stack = args.value.ok_or_else(|| {
        DomainError::Validation("either a value or a dice roll is required".to_owned())
    })?;
    let command = ApplyEffect {
        correlation_id: Uuid::new_v4(),
        character_id: args.character,
        effect_id: args.effect,
        source_kind: args.source_kind.into(),
        source_id: args.source,
        current_turn: args.turn,
        duration: args.duration,
        stacks_delta: args.stacks,
        value_per_stack,
    };
    let outcome = command_handlers::handle_apply_effect(&command, clock, store, notifier).await?;
    Ok(serde_json::to_value(outcome)?)
}
