//! Structured acknowledgment extraction from free-form replies.
//!
//! The peer answers in prose, often wrapping the structured part in a
//! markdown code fence and surrounding chatter. Extraction is all-or-nothing:
//! strip fences, take the first balanced `{...}` span, decode it, and accept
//! only when the decoded object carries an `action` tag.

use serde::Deserialize;

pub const DEFAULT_NEXT_SCAN_MINUTES: i64 = 15;

/// Action tag that triggers downstream forwarding.
pub const PUBLISH_ACTION: &str = "PUBLISH";

/// Replies at least this long are treated as failed structured attempts
/// worth a corrective nudge; anything shorter is conversational noise.
pub const MIN_PLAUSIBLE_REPLY_LEN: usize = 40;

/// The structured result of one exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResponsePacket {
    pub action: String,

    #[serde(default = "default_next_scan")]
    pub next_scan_minutes: i64,

    #[serde(default)]
    pub final_text: Option<String>,

    #[serde(default)]
    pub source_id: Option<serde_json::Value>,

    #[serde(default)]
    pub reply_to_source_id: Option<serde_json::Value>,
}

fn default_next_scan() -> i64 {
    DEFAULT_NEXT_SCAN_MINUTES
}

impl ResponsePacket {
    #[must_use]
    pub fn is_publish(&self) -> bool {
        self.action == PUBLISH_ACTION
    }
}

/// Attempt full extraction from one reply. `None` covers every failure:
/// no braces, unbalanced braces, undecodable JSON, or a decoded object
/// without an `action` field.
#[must_use]
pub fn extract(text: &str) -> Option<ResponsePacket> {
    let unfenced = strip_code_fences(text);
    let span = balanced_object_span(unfenced)?;
    let value: serde_json::Value = serde_json::from_str(span).ok()?;
    if value.get("action").is_none() {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Whether a reply that failed extraction looks like a failed structured
/// attempt rather than noise.
#[must_use]
pub fn plausible_attempt(text: &str) -> bool {
    text.trim().len() >= MIN_PLAUSIBLE_REPLY_LEN
}

/// Drop a surrounding markdown code fence, tolerating a language tag on the
/// opening line. Text without a fence passes through untouched.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag line.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Locate the first balanced `{...}` span, honoring JSON string literals and
/// escapes so braces inside strings don't unbalance the scan.
fn balanced_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            },
            _ => {},
        }
    }
    None
}
