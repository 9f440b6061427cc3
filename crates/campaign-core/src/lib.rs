//! Shared domain abstractions of the campaign effect engine.
//!
//! This crate defines the records, ports, and error taxonomy that the effect
//! engine and its adapters depend on. It contains no infrastructure code.

pub mod clock;
pub mod command;
pub mod dice;
pub mod error;
pub mod event;
pub mod model;
pub mod notify;
pub mod repository;
