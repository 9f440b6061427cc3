//! `PostgreSQL` adapter for the effect engine store ports.

pub mod migrations;
pub mod pg_effect_store;

pub use pg_effect_store::{PgEffectStore, PgEffectTransaction};
