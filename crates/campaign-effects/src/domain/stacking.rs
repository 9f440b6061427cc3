//! Stacking policy state machine for timed effects.
//!
//! Each `(character, effect, source kind)` tuple has at most one live
//! instance. Reapplying the effect combines with that instance according to
//! the effect's [`StackingPolicy`].

use campaign_core::error::DomainError;
use campaign_core::model::{AppliedEffectInstance, EffectDefinition, SourceKind, StackingPolicy};
use serde::Serialize;
use uuid::Uuid;

/// Duration actually used for an application: the requested one when
/// positive, else the effect's base duration.
#[must_use]
pub fn effective_duration(requested: Option<i32>, effect: &EffectDefinition) -> i32 {
    match requested {
        Some(turns) if turns > 0 => turns,
        _ => effect.base_duration_turns,
    }
}

/// Per-call parameters of a timed application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StackRequest {
    /// Turn the application happens on.
    pub current_turn: i32,
    /// Positive duration in turns.
    pub duration: i32,
    /// Requested stack change.
    pub stacks_delta: i32,
    /// Magnitude contributed by each stack.
    pub value_per_stack: f64,
}

impl StackRequest {
    /// Last turn of the requested window.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` when the window end does not fit a
    /// turn number.
    pub fn window_end(&self) -> Result<i32, DomainError> {
        self.current_turn.checked_add(self.duration).ok_or_else(|| {
            DomainError::Validation(format!(
                "turn {} plus duration {} is out of range",
                self.current_turn, self.duration
            ))
        })
    }
}

/// How an application changed the tuple's live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StackTransition {
    /// No live instance existed; one was created.
    Created,
    /// Window renewed, stacks kept.
    Refreshed,
    /// Stacks accumulated, window extended.
    Stacked,
    /// Prior state discarded.
    Replaced,
}

/// Identity of a new instance.
#[derive(Debug, Clone, Copy)]
pub struct InstanceKey {
    /// New instance identifier.
    pub instance_id: Uuid,
    /// Affected character.
    pub character_id: Uuid,
    /// Applied effect.
    pub effect_id: Uuid,
    /// Kind of the triggering source.
    pub source_kind: SourceKind,
    /// Concrete source, when known.
    pub source_id: Option<Uuid>,
}

/// Builds the instance created when no live one exists.
///
/// # Errors
///
/// Returns `DomainError::Validation` when the window end overflows.
pub fn create_instance(
    key: InstanceKey,
    request: &StackRequest,
) -> Result<AppliedEffectInstance, DomainError> {
    let expires_at_turn = request.window_end()?;
    let stacks = request.stacks_delta.max(1);
    Ok(AppliedEffectInstance {
        id: key.instance_id,
        character_id: key.character_id,
        effect_id: key.effect_id,
        source_kind: key.source_kind,
        source_id: key.source_id,
        duration_remaining: request.duration,
        started_at_turn: request.current_turn,
        expires_at_turn,
        stacks,
        cached_magnitude: f64::from(stacks) * request.value_per_stack,
        deleted_at: None,
    })
}

/// Combines a reapplication with the live instance in place. The instance
/// is left untouched on error.
///
/// # Errors
///
/// Returns `DomainError::Validation` when the window end, the stack count
/// or the remaining duration overflows.
pub fn combine(
    instance: &mut AppliedEffectInstance,
    policy: StackingPolicy,
    request: &StackRequest,
) -> Result<StackTransition, DomainError> {
    let window_end = request.window_end()?;

    let (stacks, started_at_turn, expires_at_turn, transition) = match policy {
        StackingPolicy::Refresh => (
            instance.stacks,
            request.current_turn,
            window_end,
            StackTransition::Refreshed,
        ),
        StackingPolicy::Stack => {
            let stacks = instance
                .stacks
                .checked_add(request.stacks_delta)
                .ok_or_else(|| {
                    DomainError::Validation(format!(
                        "stack count {} plus {} is out of range",
                        instance.stacks, request.stacks_delta
                    ))
                })?;
            // The window only ever extends.
            (
                stacks.max(1),
                instance.started_at_turn,
                instance.expires_at_turn.max(window_end),
                StackTransition::Stacked,
            )
        }
        StackingPolicy::Replace => (
            request.stacks_delta.max(1),
            request.current_turn,
            window_end,
            StackTransition::Replaced,
        ),
    };
    let duration_remaining = expires_at_turn
        .checked_sub(request.current_turn)
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "expiry turn {expires_at_turn} is out of range of turn {}",
                request.current_turn
            ))
        })?;

    instance.stacks = stacks;
    instance.started_at_turn = started_at_turn;
    instance.expires_at_turn = expires_at_turn;
    instance.duration_remaining = duration_remaining;
    instance.cached_magnitude = f64::from(stacks) * request.value_per_stack;
    Ok(transition)
}
