//! Shared error idiom and payload types used across all parley crates.

pub mod error;
pub mod payload;

pub use {
    error::{Error, FromMessage, Result},
    payload::{RelayMode, RelayPayload},
};
