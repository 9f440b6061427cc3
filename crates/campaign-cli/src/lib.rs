//! Operator CLI for the campaign effect engine.

pub mod cli;
pub mod commands;
pub mod config;
pub mod dice;
pub mod error;
pub mod state;
