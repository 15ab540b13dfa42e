//! Payload delivery and reply polling.
//!
//! After the payload goes out, the peer's side of the conversation is a
//! stream of echoes, transient "thinking" placeholders, prose, and
//! eventually (hopefully) a structured acknowledgment. The engine walks
//! that stream behind a monotonic cursor, nudges the peer when a reply
//! looks like a failed structured attempt, and gives up only when the
//! overall wall-clock ceiling expires.

use {
    tokio::time::Instant,
    tracing::{debug, info, warn},
};

use {
    parley_config::Timing,
    parley_transport::{InboundMessage, MAX_INLINE_MESSAGE_LEN, SessionGuard},
};

use crate::{
    error::{Error, Result},
    packet::{self, ResponsePacket},
};

/// Filename used when the payload ships as an attachment.
pub const ATTACHMENT_NAME: &str = "payload.txt";

/// Replies shorter than this are transient noise, never data.
pub const MIN_SUBSTANTIVE_LEN: usize = 5;

const CORRECTION_TEXT: &str = "That reply was not a valid structured response. Send exactly one \
JSON object containing at least an \"action\" field.";

/// High-water mark over observed message ids. Never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(i64);

impl Cursor {
    #[must_use]
    pub fn new(position: i64) -> Self {
        Self(position)
    }

    #[must_use]
    pub fn position(&self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn has_seen(&self, id: i64) -> bool {
        id <= self.0
    }

    pub fn advance(&mut self, id: i64) {
        if id > self.0 {
            self.0 = id;
        }
    }
}

/// A placeholder is a message still being produced: flagged pending by the
/// transport, or too short to carry data. The cursor does not move past
/// placeholders, since the transport may rewrite them in place.
#[must_use]
pub fn is_placeholder(message: &InboundMessage) -> bool {
    message.pending || message.text.trim().len() < MIN_SUBSTANTIVE_LEN
}

/// Deliver the payload and poll for a structured acknowledgment.
///
/// Returns [`Error::ExchangeTimeout`] when the ceiling expires with no
/// valid packet; every other error is a transport fault.
pub async fn run(
    session: &SessionGuard,
    rendered: &str,
    timing: &Timing,
) -> Result<ResponsePacket> {
    let sent_id = if rendered.len() < MAX_INLINE_MESSAGE_LEN {
        session.send_text(rendered).await?
    } else {
        info!(bytes = rendered.len(), "payload exceeds inline limit, attaching");
        session
            .send_attachment(ATTACHMENT_NAME, rendered.as_bytes())
            .await?
    };

    let mut cursor = Cursor::new(sent_id);
    let mut corrections = 0u32;
    let deadline = Instant::now() + timing.exchange_ceiling;

    loop {
        let now = Instant::now();
        if now >= deadline {
            warn!("exchange ceiling reached with no valid packet");
            return Err(Error::ExchangeTimeout);
        }

        let fetch_window = timing.fetch_timeout.min(deadline - now);
        let messages =
            match tokio::time::timeout(fetch_window, session.recent_messages(timing.recent_window))
                .await
            {
                Err(_) => {
                    debug!("fetch window elapsed, retrying");
                    continue;
                },
                Ok(Err(e)) => {
                    warn!(error = %e, "message fetch failed, retrying");
                    tokio::time::sleep(timing.poll_interval).await;
                    continue;
                },
                Ok(Ok(messages)) => messages,
            };

        // Oldest first, so the cursor advances in id order.
        for message in messages.iter().rev() {
            if cursor.has_seen(message.id) {
                continue;
            }
            if message.outgoing {
                cursor.advance(message.id);
                continue;
            }
            if is_placeholder(message) {
                continue;
            }

            cursor.advance(message.id);
            if let Some(response) = packet::extract(&message.text) {
                info!(action = %response.action, "structured reply accepted");
                return Ok(response);
            }

            if packet::plausible_attempt(&message.text) && corrections < timing.max_corrections {
                corrections += 1;
                warn!(corrections, len = message.text.len(), "malformed reply, sending correction");
                let correction_id = session.send_text(CORRECTION_TEXT).await?;
                cursor.advance(correction_id);
            } else {
                debug!(id = message.id, "ignoring non-structured chatter");
            }
        }

        tokio::time::sleep(timing.poll_interval).await;
    }
}
