//! Pure effect rules: formula parsing, target resolution, pool arithmetic,
//! stacking, turns, equipment, and derived stats.

pub mod apply;
pub mod commands;
pub mod derived;
pub mod equipment;
pub mod events;
pub mod formula;
pub mod pools;
pub mod resistance;
pub mod snapshot;
pub mod stacking;
pub mod target;
pub mod turns;
