//! Command handlers for the effect engine.
//!
//! Each handler runs one store transaction: load what the decision needs,
//! apply the domain rules to an in-memory snapshot, write the diff, commit.
//! Any error drops the transaction so nothing is persisted. Status
//! notifications go out only after commit and never fail the handler.

use campaign_core::clock::Clock;
use campaign_core::dice::{DiceEvaluator, RollOutcome};
use campaign_core::error::DomainError;
use campaign_core::event::{EventMetadata, Notification};
use campaign_core::model::{AppliedEffectInstance, InventoryEntry, SourceKind};
use campaign_core::notify::StatusNotifier;
use campaign_core::repository::{EffectStore, EffectTransaction, TurnScope};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::apply::{apply_immediate, apply_timed, resolve_pool_targets};
use crate::domain::commands::{
    AdvanceAllEffects, AdvanceCharacterEffects, AdvanceEffect, ApplyEffect, ApplyRolledEffect,
    MergeEquippedDuplicates, RecomputeDerivedStatus, SetEquipped,
};
use crate::domain::derived::{ArchetypeScaling, DerivedStatFormula, recompute_derived};
use crate::domain::equipment::{Direction, EquipmentOutcome, apply_equipment_link, plan_merge, slot_occupant};
use crate::domain::events::{PoolsChanged, StatusEvent, StatusEventKind};
use crate::domain::formula::parse_source_formula;
use crate::domain::pools::AppliedChange;
use crate::domain::snapshot::CharacterSnapshot;
use crate::domain::stacking::{
    InstanceKey, StackRequest, StackTransition, combine, create_instance, effective_duration,
};
use crate::domain::target::TriggerContext;
use crate::domain::turns::{TurnSummary, advance_instance};

/// Result of applying an effect.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// Zero or negative effective duration: pools changed, no instance.
    Immediate {
        /// One entry per resolved target.
        changes: Vec<AppliedChange>,
    },
    /// Positive effective duration: the tuple's live instance was created or
    /// combined, then its total magnitude applied.
    Timed {
        /// The instance after the application.
        instance: AppliedEffectInstance,
        /// How the instance changed.
        transition: StackTransition,
        /// One entry per resolved target.
        changes: Vec<AppliedChange>,
    },
}

impl ApplyOutcome {
    /// Pool changes of either path.
    #[must_use]
    pub fn changes(&self) -> &[AppliedChange] {
        match self {
            Self::Immediate { changes } | Self::Timed { changes, .. } => changes,
        }
    }
}

/// Result of applying a dice-driven effect.
#[derive(Debug, Clone, Serialize)]
pub struct RolledApplication {
    /// The evaluator's output.
    pub roll: RollOutcome,
    /// Magnitude per stack derived from the roll.
    pub value_per_stack: f64,
    /// The application itself.
    pub outcome: ApplyOutcome,
}

/// Result of equipping or unequipping an entry.
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentChange {
    /// The entry after the command.
    pub entry: InventoryEntry,
    /// Whether the equipped flag actually flipped.
    pub toggled: bool,
    /// Pool changes from item effects.
    pub changes: Vec<AppliedChange>,
    /// Pool changes from derived recomputation.
    pub derived: Vec<AppliedChange>,
}

/// Result of merging duplicate equipped entries.
#[derive(Debug, Clone, Serialize)]
pub struct MergeOutcome {
    /// The surviving entry, when the slot held anything.
    pub keeper: Option<InventoryEntry>,
    /// Entries folded into the keeper and soft-deleted.
    pub merged_ids: Vec<Uuid>,
    /// Pool changes from reversed item effects.
    pub changes: Vec<AppliedChange>,
    /// Pool changes from derived recomputation.
    pub derived: Vec<AppliedChange>,
}

async fn load_snapshot(
    tx: &mut dyn EffectTransaction,
    character_id: Uuid,
) -> Result<CharacterSnapshot, DomainError> {
    let pools = tx.load_pools(character_id).await?;
    let catalog = tx.load_attribute_catalog().await?;
    let values = tx.load_character_attributes(character_id).await?;
    Ok(CharacterSnapshot::new(character_id, pools, catalog, values))
}

/// Writes changed pool fields and attribute deltas. Returns `true` if any
/// pool changed.
async fn persist_snapshot(
    tx: &mut dyn EffectTransaction,
    snapshot: &CharacterSnapshot,
) -> Result<bool, DomainError> {
    let writes = snapshot.pool_writes();
    for write in &writes {
        tx.write_pool(write).await?;
    }
    for change in snapshot.attribute_deltas() {
        tx.add_equipment_delta(snapshot.character_id(), change.attribute_id, change.delta)
            .await?;
    }
    Ok(!writes.is_empty())
}

async fn archetype_scaling(
    tx: &mut dyn EffectTransaction,
    character_id: Uuid,
) -> Result<ArchetypeScaling, DomainError> {
    let character = tx
        .load_character(character_id)
        .await?
        .ok_or(DomainError::CharacterNotFound(character_id))?;
    let Some(archetype_id) = character.archetype_id else {
        return Ok(ArchetypeScaling::default());
    };
    Ok(tx
        .load_archetype(archetype_id)
        .await?
        .map_or_else(ArchetypeScaling::default, |archetype| {
            ArchetypeScaling::from(&archetype)
        }))
}

/// Applies every effect linked to `item_id` in `direction`.
async fn trigger_item_effects(
    tx: &mut dyn EffectTransaction,
    snapshot: &mut CharacterSnapshot,
    item_id: Uuid,
    direction: Direction,
) -> Result<EquipmentOutcome, DomainError> {
    let mut total = EquipmentOutcome::default();
    for link in tx.load_source_links(SourceKind::Item, item_id).await? {
        let Some(effect) = tx.load_effect(link.effect_id).await? else {
            debug!(%item_id, effect_id = %link.effect_id, "Linked effect missing, skipping");
            continue;
        };
        let formula = parse_source_formula(&link.formula);
        let outcome = apply_equipment_link(snapshot, &effect, &formula, direction)?;
        total.changes.extend(outcome.changes);
        total.attributes_changed |= outcome.attributes_changed;
    }
    Ok(total)
}

async fn publish_pools_changed(
    notifier: &dyn StatusNotifier,
    clock: &dyn Clock,
    correlation_id: Uuid,
    snapshot: CharacterSnapshot,
) {
    let character_id = snapshot.character_id();
    let event = StatusEvent {
        metadata: EventMetadata {
            event_id: Uuid::new_v4(),
            event_type: "effects.pools_changed".to_owned(),
            character_id,
            correlation_id,
            occurred_at: clock.now(),
        },
        kind: StatusEventKind::PoolsChanged(PoolsChanged {
            character_id,
            pools: snapshot.pools().to_vec(),
        }),
    };
    if let Err(e) = notifier.publish(Notification::from_event(&event)).await {
        warn!(%character_id, error = %e, "Status notification failed after commit");
    }
}

/// Handles the `ApplyEffect` command.
///
/// A non-positive effective duration applies the effect instantly, with
/// resistance mitigation. A positive one goes through the stacking policy
/// and then applies the instance's total magnitude.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a non-finite `value_per_stack` or
/// a turn window that overflows, `DomainError::EffectNotFound` for an
/// unknown effect, `DomainError::UnresolvedDynamicTarget` for an unresolvable dynamic
/// modifier, `DomainError::ConcurrencyConflict` when another caller created
/// the tuple's instance first, or any storage error.
#[instrument(skip_all, fields(
    correlation_id = %command.correlation_id,
    character_id = %command.character_id,
    effect_id = %command.effect_id,
))]
pub async fn handle_apply_effect(
    command: &ApplyEffect,
    clock: &dyn Clock,
    store: &dyn EffectStore,
    notifier: &dyn StatusNotifier,
) -> Result<ApplyOutcome, DomainError> {
    if !command.value_per_stack.is_finite() {
        return Err(DomainError::Validation(
            "value_per_stack must be a finite number".to_owned(),
        ));
    }

    let mut tx = store.begin().await?;
    let effect = tx
        .load_effect(command.effect_id)
        .await?
        .ok_or(DomainError::EffectNotFound(command.effect_id))?;

    let formula = match (command.source_kind, command.source_id) {
        (SourceKind::Item | SourceKind::Skill, Some(source_id)) => tx
            .load_source_link(command.source_kind, source_id, command.effect_id)
            .await?
            .map(|link| parse_source_formula(&link.formula)),
        _ => None,
    };
    let trigger = TriggerContext {
        effect_id: effect.id,
        source_kind: command.source_kind,
        formula: formula.as_ref(),
    };

    let mut snapshot = load_snapshot(tx.as_mut(), command.character_id).await?;
    let duration = effective_duration(command.duration, &effect);

    let outcome = if duration <= 0 {
        let changes = apply_immediate(
            &mut snapshot,
            &effect,
            &trigger,
            command.stacks_delta,
            command.value_per_stack,
        )?;
        ApplyOutcome::Immediate { changes }
    } else {
        let targets = resolve_pool_targets(&effect, &snapshot, &trigger)?;
        let request = StackRequest {
            current_turn: command.current_turn,
            duration,
            stacks_delta: command.stacks_delta,
            value_per_stack: command.value_per_stack,
        };

        let existing = tx
            .find_active_instance(
                command.character_id,
                command.effect_id,
                command.source_kind,
                command.current_turn,
            )
            .await?;
        let (instance, transition) = match existing {
            Some(mut instance) => {
                let transition = combine(&mut instance, effect.stacking_policy, &request)?;
                tx.update_instance(&instance).await?;
                (instance, transition)
            }
            None => {
                let retired = tx
                    .retire_stale_instances(
                        command.character_id,
                        command.effect_id,
                        command.source_kind,
                        command.current_turn,
                        clock.now(),
                    )
                    .await?;
                if retired > 0 {
                    debug!(retired, "Retired expired instances before creating a new one");
                }
                let key = InstanceKey {
                    instance_id: Uuid::new_v4(),
                    character_id: command.character_id,
                    effect_id: command.effect_id,
                    source_kind: command.source_kind,
                    source_id: command.source_id,
                };
                let instance = create_instance(key, &request)?;
                tx.insert_instance(&instance).await?;
                (instance, StackTransition::Created)
            }
        };

        let changes = apply_timed(
            &mut snapshot,
            &targets,
            command.value_per_stack,
            instance.stacks,
        );
        ApplyOutcome::Timed {
            instance,
            transition,
            changes,
        }
    };

    let pools_changed = persist_snapshot(tx.as_mut(), &snapshot).await?;
    tx.commit().await?;

    info!(
        changes = outcome.changes().len(),
        duration, "Effect applied"
    );
    if pools_changed {
        publish_pools_changed(notifier, clock, command.correlation_id, snapshot).await;
    }
    Ok(outcome)
}

/// Handles the `ApplyRolledEffect` command: evaluates the dice expression,
/// then applies the effect with the rolled magnitude.
///
/// # Errors
///
/// Returns the evaluator's error for a bad expression, otherwise the errors
/// of [`handle_apply_effect`].
#[instrument(skip_all, fields(
    correlation_id = %command.correlation_id,
    expression = %command.expression,
))]
pub async fn handle_apply_rolled_effect(
    command: &ApplyRolledEffect,
    clock: &dyn Clock,
    dice: &dyn DiceEvaluator,
    store: &dyn EffectStore,
    notifier: &dyn StatusNotifier,
) -> Result<RolledApplication, DomainError> {
    let roll = dice.evaluate(&command.expression)?;
    let value_per_stack = if command.harmful {
        -roll.total.abs()
    } else {
        roll.total
    };
    debug!(total = roll.total, value_per_stack, "Dice evaluated");

    let apply = ApplyEffect {
        correlation_id: command.correlation_id,
        character_id: command.character_id,
        effect_id: command.effect_id,
        source_kind: command.source_kind,
        source_id: command.source_id,
        current_turn: command.current_turn,
        duration: command.duration,
        stacks_delta: command.stacks_delta,
        value_per_stack,
    };
    let outcome = handle_apply_effect(&apply, clock, store, notifier).await?;

    Ok(RolledApplication {
        roll,
        value_per_stack,
        outcome,
    })
}

/// Handles the `AdvanceEffect` command: one turn off one live instance,
/// retiring it when no duration remains.
///
/// # Errors
///
/// Returns `DomainError::InstanceNotActive` if the instance is absent or
/// already retired.
#[instrument(skip_all, fields(
    correlation_id = %command.correlation_id,
    instance_id = %command.instance_id,
))]
pub async fn handle_advance_effect(
    command: &AdvanceEffect,
    clock: &dyn Clock,
    store: &dyn EffectStore,
) -> Result<AppliedEffectInstance, DomainError> {
    let mut tx = store.begin().await?;
    let mut instance = tx
        .load_live_instance(command.instance_id)
        .await?
        .ok_or(DomainError::InstanceNotActive(command.instance_id))?;

    let retired = advance_instance(&mut instance, clock.now());
    tx.update_instance(&instance).await?;
    tx.commit().await?;

    info!(
        duration_remaining = instance.duration_remaining,
        retired, "Effect advanced"
    );
    Ok(instance)
}

async fn advance_scope(
    scope: TurnScope,
    clock: &dyn Clock,
    store: &dyn EffectStore,
) -> Result<TurnSummary, DomainError> {
    let mut tx = store.begin().await?;
    let updated_count = tx.decrement_durations(scope).await?;
    let expired_count = tx.retire_exhausted(scope, clock.now()).await?;
    tx.commit().await?;

    info!(updated_count, expired_count, "Turn advanced");
    Ok(TurnSummary {
        updated_count,
        expired_count,
    })
}

/// Handles the `AdvanceAllEffects` command.
///
/// # Errors
///
/// Returns `DomainError` if the store fails.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_advance_all_effects(
    command: &AdvanceAllEffects,
    clock: &dyn Clock,
    store: &dyn EffectStore,
) -> Result<TurnSummary, DomainError> {
    advance_scope(TurnScope::All, clock, store).await
}

/// Handles the `AdvanceCharacterEffects` command.
///
/// # Errors
///
/// Returns `DomainError` if the store fails.
#[instrument(skip_all, fields(
    correlation_id = %command.correlation_id,
    character_id = %command.character_id,
))]
pub async fn handle_advance_character_effects(
    command: &AdvanceCharacterEffects,
    clock: &dyn Clock,
    store: &dyn EffectStore,
) -> Result<TurnSummary, DomainError> {
    advance_scope(TurnScope::Character(command.character_id), clock, store).await
}

/// Handles the `SetEquipped` command: flips the flag and applies or reverses
/// the item's effects in the same transaction.
///
/// # Errors
///
/// Returns `DomainError::InventoryEntryNotFound` for an unknown entry,
/// `DomainError::SlotConflict` when the slot is taken,
/// `DomainError::CharacterNotFound` when attribute changes require a
/// recomputation for a missing character, or the errors of the effect path.
#[instrument(skip_all, fields(
    correlation_id = %command.correlation_id,
    entry_id = %command.entry_id,
    equipped = command.equipped,
))]
pub async fn handle_set_equipped(
    command: &SetEquipped,
    clock: &dyn Clock,
    formula: &dyn DerivedStatFormula,
    store: &dyn EffectStore,
    notifier: &dyn StatusNotifier,
) -> Result<EquipmentChange, DomainError> {
    let mut tx = store.begin().await?;
    let mut entry = tx
        .load_inventory_entry(command.entry_id)
        .await?
        .ok_or(DomainError::InventoryEntryNotFound(command.entry_id))?;

    if entry.equipped == command.equipped {
        debug!("Equipped flag unchanged, nothing to do");
        return Ok(EquipmentChange {
            entry,
            toggled: false,
            changes: Vec::new(),
            derived: Vec::new(),
        });
    }

    let character_id = entry.character_id;
    if command.equipped {
        let inventory = tx.list_inventory(character_id).await?;
        if slot_occupant(&entry, &inventory).is_some() {
            return Err(DomainError::SlotConflict {
                character_id,
                slot: entry.slot.clone().unwrap_or_default(),
            });
        }
    }

    let direction = if command.equipped {
        Direction::Apply
    } else {
        Direction::Reverse
    };
    let mut snapshot = load_snapshot(tx.as_mut(), character_id).await?;
    let outcome = trigger_item_effects(tx.as_mut(), &mut snapshot, entry.item_id, direction).await?;

    let derived = if outcome.attributes_changed {
        let scaling = archetype_scaling(tx.as_mut(), character_id).await?;
        recompute_derived(&mut snapshot, formula, &scaling)
    } else {
        Vec::new()
    };

    entry.equipped = command.equipped;
    tx.save_inventory_entry(&entry).await?;
    let pools_changed = persist_snapshot(tx.as_mut(), &snapshot).await?;
    tx.commit().await?;

    info!(
        %character_id,
        item_id = %entry.item_id,
        changes = outcome.changes.len(),
        "Equipment toggled"
    );
    if pools_changed {
        publish_pools_changed(notifier, clock, command.correlation_id, snapshot).await;
    }
    Ok(EquipmentChange {
        entry,
        toggled: true,
        changes: outcome.changes,
        derived,
    })
}

/// Handles the `MergeEquippedDuplicates` command: entries of the keeper's
/// item in the slot have their effects reversed, their quantity moved to
/// the keeper, and are unequipped and soft-deleted.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty slot name,
/// `DomainError::SlotConflict` when the slot holds different items, or the
/// errors of the effect path.
#[instrument(skip_all, fields(
    correlation_id = %command.correlation_id,
    character_id = %command.character_id,
    slot = %command.slot,
))]
pub async fn handle_merge_equipped_duplicates(
    command: &MergeEquippedDuplicates,
    clock: &dyn Clock,
    formula: &dyn DerivedStatFormula,
    store: &dyn EffectStore,
    notifier: &dyn StatusNotifier,
) -> Result<MergeOutcome, DomainError> {
    let mut tx = store.begin().await?;
    let inventory = tx.list_inventory(command.character_id).await?;
    let Some(plan) = plan_merge(command.character_id, &inventory, &command.slot)? else {
        debug!("Nothing equipped in slot");
        return Ok(MergeOutcome {
            keeper: None,
            merged_ids: Vec::new(),
            changes: Vec::new(),
            derived: Vec::new(),
        });
    };

    let find = |id: Uuid| {
        inventory
            .iter()
            .find(|entry| entry.id == id)
            .cloned()
            .ok_or(DomainError::InventoryEntryNotFound(id))
    };
    let mut keeper = find(plan.keeper_id)?;
    let mut snapshot = load_snapshot(tx.as_mut(), command.character_id).await?;
    let mut changes = Vec::new();
    let mut attributes_changed = false;
    let now = clock.now();

    for merged_id in &plan.merged_ids {
        let mut merged = find(*merged_id)?;
        let outcome =
            trigger_item_effects(tx.as_mut(), &mut snapshot, merged.item_id, Direction::Reverse)
                .await?;
        changes.extend(outcome.changes);
        attributes_changed |= outcome.attributes_changed;

        keeper.quantity += merged.quantity;
        merged.equipped = false;
        merged.deleted_at = Some(now);
        tx.save_inventory_entry(&merged).await?;
    }
    tx.save_inventory_entry(&keeper).await?;

    let derived = if attributes_changed {
        let scaling = archetype_scaling(tx.as_mut(), command.character_id).await?;
        recompute_derived(&mut snapshot, formula, &scaling)
    } else {
        Vec::new()
    };

    let pools_changed = persist_snapshot(tx.as_mut(), &snapshot).await?;
    tx.commit().await?;

    info!(
        keeper_id = %keeper.id,
        merged = plan.merged_ids.len(),
        "Equipped duplicates merged"
    );
    if pools_changed {
        publish_pools_changed(notifier, clock, command.correlation_id, snapshot).await;
    }
    Ok(MergeOutcome {
        keeper: Some(keeper),
        merged_ids: plan.merged_ids,
        changes,
        derived,
    })
}

/// Handles the `RecomputeDerivedStatus` command.
///
/// # Errors
///
/// Returns `DomainError::CharacterNotFound` for an unknown character.
#[instrument(skip_all, fields(
    correlation_id = %command.correlation_id,
    character_id = %command.character_id,
))]
pub async fn handle_recompute_derived_status(
    command: &RecomputeDerivedStatus,
    clock: &dyn Clock,
    formula: &dyn DerivedStatFormula,
    store: &dyn EffectStore,
    notifier: &dyn StatusNotifier,
) -> Result<Vec<AppliedChange>, DomainError> {
    let mut tx = store.begin().await?;
    let scaling = archetype_scaling(tx.as_mut(), command.character_id).await?;
    let mut snapshot = load_snapshot(tx.as_mut(), command.character_id).await?;

    let changes = recompute_derived(&mut snapshot, formula, &scaling);
    let pools_changed = persist_snapshot(tx.as_mut(), &snapshot).await?;
    tx.commit().await?;

    info!(changes = changes.len(), "Derived status recomputed");
    if pools_changed {
        publish_pools_changed(notifier, clock, command.correlation_id, snapshot).await;
    }
    Ok(changes)
}
