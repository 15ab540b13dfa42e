//! Environment-backed construction of [`RelayConfig`].
//!
//! Reads `PARLEY_*` variables once and produces the immutable config value.
//! The binary is responsible for loading `.env` files before calling in.

use {parley_common::RelayPayload, secrecy::Secret, tracing::debug};

use crate::{
    error::{Error, Result},
    schema::{RelayConfig, Timing},
};

const NODE_ID: &str = "PARLEY_NODE_ID";
const NODE_SECRET: &str = "PARLEY_NODE_SECRET";
const SESSION: &str = "PARLEY_SESSION";
const PEER: &str = "PARLEY_PEER";
const TELEMETRY_URL: &str = "PARLEY_TELEMETRY_URL";
const RELAY_URL: &str = "PARLEY_RELAY_URL";
const PAYLOAD: &str = "PARLEY_PAYLOAD";
const STATE_DIR: &str = "PARLEY_STATE_DIR";

/// Build a validated [`RelayConfig`] from the process environment.
pub fn from_env() -> Result<RelayConfig> {
    let config = RelayConfig {
        node_id: parse_node_id(&require(NODE_ID)?)?,
        node_secret: Secret::new(require(NODE_SECRET)?),
        session_credential: Secret::new(require(SESSION)?),
        peer: require(PEER)?,
        telemetry_url: optional(TELEMETRY_URL),
        relay_url: optional(RELAY_URL),
        payload: RelayPayload::parse(&optional(PAYLOAD).unwrap_or_default()),
        state_dir: optional(STATE_DIR).map(Into::into),
        timing: Timing::default(),
    };
    config.validate()?;
    debug!(peer = %config.peer, "relay config loaded from environment");
    Ok(config)
}

fn require(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(Error::missing(name)),
    }
}

fn optional(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_node_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| Error::invalid(NODE_ID, format!("not an integer: {raw:?}")))
}
