//! Shared test doubles and fixtures for the campaign effect engine.

mod clock;
mod dice;
pub mod fixtures;
mod notifier;
mod store;

pub use clock::FixedClock;
pub use dice::FixedDice;
pub use notifier::{FailingNotifier, RecordingNotifier};
pub use store::{FailingEffectStore, InMemoryEffectStore, StoreState};
