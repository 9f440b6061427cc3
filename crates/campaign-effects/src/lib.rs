//! Effect application and status resolution for the campaign manager.
//!
//! Turns catalog effects (damage, buffs, debuffs, equipment bonuses) into
//! bounded mutations of a character's resource pools and attributes, tracks
//! applied effect lifetimes across turns, and keeps derived pools in step
//! with equipment changes.

pub mod application;
pub mod domain;
