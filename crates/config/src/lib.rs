//! Relay configuration: built once at startup, immutable for the cycle.
//!
//! Values come from the process environment (`PARLEY_*` variables) after the
//! binary has loaded any `.env` file. Components receive the config by
//! reference and never read the environment ad hoc.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::from_env,
    schema::{RelayConfig, Timing},
};
