//! Command abstractions.

use uuid::Uuid;

/// Trait implemented by every engine entry-point command.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable command name used in logs, e.g. `effects.apply_effect`.
    fn command_type(&self) -> &'static str;

    /// Correlation ID linking the command to the notifications it produces.
    fn correlation_id(&self) -> Uuid;
}
