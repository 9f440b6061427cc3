//! Application layer: command and query handlers plus notifier adapters.

pub mod command_handlers;
pub mod notifier;
pub mod query_handlers;
