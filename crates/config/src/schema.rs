use std::{path::PathBuf, time::Duration};

use {
    parley_common::RelayPayload,
    secrecy::{ExposeSecret, Secret},
};

use crate::error::{Error, Result};

/// Every delay, ceiling, and retry bound used by the relay cycle.
///
/// All waits live here so tests can shrink them; component logic never
/// hard-codes a duration.
#[derive(Debug, Clone)]
pub struct Timing {
    /// Per-fetch timeout while polling for a reply. Expiry means "no new
    /// message yet" and the fetch is retried within the overall ceiling.
    pub fetch_timeout: Duration,
    /// Pause between successive reply polls.
    pub poll_interval: Duration,
    /// Overall wall-clock ceiling for the exchange. Expiry ends the cycle
    /// with no result.
    pub exchange_ceiling: Duration,
    /// Settle delay after clicking a menu choice.
    pub settle: Duration,
    /// Wait between re-scans while hunting for a menu button.
    pub nav_retry_wait: Duration,
    /// Re-scan attempts per menu step before the soft-failure path.
    pub nav_retries: u32,
    /// Buffering delay after the system prompt, so its acknowledgment does
    /// not interleave with the data transfer.
    pub prompt_buffer: Duration,
    /// Corrective instructions sent per cycle before polling silently.
    pub max_corrections: u32,
    /// How many recent messages each scan inspects.
    pub recent_window: usize,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
            exchange_ceiling: Duration::from_secs(240),
            settle: Duration::from_secs(2),
            nav_retry_wait: Duration::from_secs(2),
            nav_retries: 3,
            prompt_buffer: Duration::from_secs(3),
            max_corrections: 3,
            recent_window: 5,
        }
    }
}

/// Immutable configuration for one relay cycle.
#[derive(Clone)]
pub struct RelayConfig {
    /// Numeric identity of this node with the transport.
    pub node_id: i64,
    /// Transport API secret paired with `node_id`.
    pub node_secret: Secret<String>,
    /// Opaque session credential; candidate encodings are derived from it.
    pub session_credential: Secret<String>,
    /// Peer reference: numeric id or symbolic name.
    pub peer: String,
    /// Heartbeat endpoint. Unset disables the heartbeat POST.
    pub telemetry_url: Option<String>,
    /// Downstream relay endpoint. Unset disables forwarding.
    pub relay_url: Option<String>,
    /// Input payload for this cycle.
    pub payload: RelayPayload,
    /// Directory for the persisted failure counter. Unset uses the default
    /// home-relative location.
    pub state_dir: Option<PathBuf>,
    pub timing: Timing,
}

impl RelayConfig {
    /// Reject configurations that cannot possibly complete a cycle.
    pub fn validate(&self) -> Result<()> {
        if self.session_credential.expose_secret().trim().is_empty() {
            return Err(Error::invalid("PARLEY_SESSION", "credential is empty"));
        }
        if self.peer.trim().is_empty() {
            return Err(Error::invalid("PARLEY_PEER", "peer reference is empty"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("node_id", &self.node_id)
            .field("node_secret", &"[REDACTED]")
            .field("session_credential", &"[REDACTED]")
            .field("peer", &self.peer)
            .field("telemetry_url", &self.telemetry_url)
            .field("relay_url", &self.relay_url)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}
