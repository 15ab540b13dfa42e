//! Relay input payload: what the caller wants delivered to the remote peer.
//!
//! The input arrives either as a bare content string or as a structured JSON
//! object carrying mode, prompt override, and scheduling context. Parsing is
//! forgiving: anything that is not a decodable object is treated as raw
//! content in `DATA` mode.

use serde::{Deserialize, Serialize};

/// Requested operating mode for a relay cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RelayMode {
    /// Plain data transfer; the peer is assumed to already be configured.
    #[default]
    Data,
    /// Drive the peer through the menu sequence before transferring data.
    Init,
}

/// Input payload for one relay cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayPayload {
    pub mode: RelayMode,

    /// System prompt override sent during navigation instead of the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// The content line delivered to the peer.
    pub content: String,

    /// Time-context line prepended to the content when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_context: Option<String>,

    /// Force the full navigation reset regardless of mode.
    pub force_reset: bool,
}

impl RelayPayload {
    /// Parse the raw payload input: a JSON object or a bare content string.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{')
            && let Ok(payload) = serde_json::from_str::<Self>(trimmed)
        {
            return payload;
        }
        Self {
            content: trimmed.to_string(),
            ..Self::default()
        }
    }

    /// Render the outgoing message: time-context line plus content line.
    #[must_use]
    pub fn rendered(&self) -> String {
        match self.time_context.as_deref().map(str::trim) {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}\n{}", self.content),
            _ => self.content.clone(),
        }
    }

    /// Whether the payload carries any content worth a transport round-trip.
    #[must_use]
    pub fn is_substantive(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// Whether this cycle asks for menu navigation before the exchange.
    #[must_use]
    pub fn wants_navigation(&self) -> bool {
        self.force_reset || self.mode == RelayMode::Init
    }
}
