//! Shared application state.

use std::sync::Arc;

use campaign_core::clock::{Clock, SystemClock};
use campaign_core::dice::DiceEvaluator;
use campaign_core::notify::StatusNotifier;
use campaign_core::repository::EffectStore;
use campaign_effects::application::notifier::LoggingNotifier;
use campaign_effects::domain::derived::{ArchetypeWeightedFormula, DerivedStatFormula};
use campaign_store::PgEffectStore;
use sqlx::PgPool;

use crate::dice::RandomDice;

/// Collaborators every subcommand runs against.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool.
    pub db_pool: PgPool,
    /// Transactional effect store.
    pub store: Arc<dyn EffectStore>,
    /// Wall clock for soft-delete stamps and notifications.
    pub clock: Arc<dyn Clock>,
    /// Post-commit status delivery.
    pub notifier: Arc<dyn StatusNotifier>,
    /// Dice evaluator for rolled effects.
    pub dice: Arc<dyn DiceEvaluator>,
    /// Derived pool formula.
    pub formula: Arc<dyn DerivedStatFormula>,
}

impl AppState {
    /// Create production state over `db_pool`.
    #[must_use]
    pub fn new(db_pool: PgPool) -> Self {
        Self {
            store: Arc::new(PgEffectStore::new(db_pool.clone())),
            db_pool,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(LoggingNotifier),
            dice: Arc::new(RandomDice),
            formula: Arc::new(ArchetypeWeightedFormula),
        }
    }
}
