//! Error types of the operator CLI.

use campaign_core::error::DomainError;
use sqlx::migrate::MigrateError;
use thiserror::Error;

/// Startup and runtime errors of the operator CLI.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failure.
    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),

    /// The engine rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A result could not be rendered as JSON.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl AppError {
    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration_error",
            Self::Database(_) => "database_error",
            Self::Migration(_) => "migration_error",
            Self::Output(_) => "output_error",
            Self::Domain(err) => match err {
                DomainError::EffectNotFound(_) => "effect_not_found",
                DomainError::InstanceNotActive(_) => "instance_not_active",
                DomainError::CharacterNotFound(_) => "character_not_found",
                DomainError::InventoryEntryNotFound(_) => "inventory_entry_not_found",
                DomainError::UnresolvedDynamicTarget { .. } => "unresolved_dynamic_target",
                DomainError::SlotConflict { .. } => "slot_conflict",
                DomainError::ConcurrencyConflict { .. } => "concurrency_conflict",
                DomainError::Validation(_) => "validation_error",
                DomainError::Infrastructure(_) => "infrastructure_error",
            },
        }
    }
}
