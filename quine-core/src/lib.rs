#![deny(missing_docs)]
//! Shared foundation for the quine runtime.
//!
//! Holds the pieces every other crate needs: configuration sourced from
//! `QUINE_*` environment variables, the wisdom map that survives process
//! replacement, session identity, process-group primitives, and the exit
//! code contract.

pub mod config;
pub mod exit;
pub mod process;
pub mod session;
pub mod wisdom;

pub use config::{ApiFlavor, Config, ConfigError};
pub use wisdom::Wisdom;
