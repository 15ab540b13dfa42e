//! Transport capability traits and the per-cycle session guard.

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use crate::{
    credential,
    error::{Error, Result},
    peer::{Peer, PeerRef},
};

/// Longest message the transport accepts inline; anything bigger goes out as
/// an attachment.
pub const MAX_INLINE_MESSAGE_LEN: usize = 4096;

/// The authenticated account's own identity, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub username: Option<String>,
}

/// One message observed in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Transport message id; ids grow monotonically within a conversation.
    pub id: i64,
    pub text: String,
    /// Sent by this account (echo of our own traffic).
    pub outgoing: bool,
    /// Transient placeholder the peer is still editing ("thinking").
    pub pending: bool,
    /// Labels of inline choices attached to the message.
    pub choices: Vec<String>,
}

/// Entry point to the messaging transport: authenticate one credential.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self, credential: &str) -> Result<Box<dyn ChatSession>>;
}

/// An authenticated connection. Every operation targets the peer explicitly;
/// the guard layers per-cycle peer binding on top.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Report the authenticated account's own identity. Used as the explicit
    /// post-connect verification; a session whose identity cannot be
    /// confirmed is treated as a failed candidate.
    async fn identify(&self) -> Result<Identity>;

    /// Primary peer lookup from a configured reference.
    async fn resolve_peer(&self, reference: &PeerRef) -> Result<Peer>;

    /// Fallback lookup by name search, for when the primary raises
    /// [`Error::PeerNotFound`].
    async fn search_peer(&self, name: &str) -> Result<Peer>;

    async fn send_text(&self, peer: &Peer, text: &str) -> Result<i64>;

    async fn send_attachment(&self, peer: &Peer, filename: &str, bytes: &[u8]) -> Result<i64>;

    /// Fetch up to `limit` most recent conversation messages, newest first.
    async fn recent_messages(&self, peer: &Peer, limit: usize) -> Result<Vec<InboundMessage>>;

    /// Press the inline choice with the given label on a message.
    async fn click_choice(&self, peer: &Peer, message_id: i64, label: &str) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// Owns the session for one relay cycle.
///
/// Establishment tries each credential candidate in order and keeps the
/// first that both connects and confirms its identity, then resolves the
/// peer (primary lookup, name search on not-found). The cycle driver must
/// call [`SessionGuard::close`] on every exit path; dropping an open guard
/// only logs, since disconnect needs an await point.
pub struct SessionGuard {
    session: Option<Box<dyn ChatSession>>,
    identity: Identity,
    peer: Peer,
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("open", &self.session.is_some())
            .field("identity", &self.identity)
            .field("peer", &self.peer)
            .finish()
    }
}

impl SessionGuard {
    pub async fn establish(
        transport: &dyn ChatTransport,
        raw_credential: &str,
        reference: &PeerRef,
    ) -> Result<Self> {
        let candidates = credential::candidates(raw_credential)?;
        let attempts = candidates.len();

        let mut confirmed = None;
        for (index, candidate) in candidates.iter().enumerate() {
            debug!(
                index,
                base64 = credential::decodes_as_base64(candidate),
                "attempting credential candidate"
            );
            match transport.connect(candidate).await {
                Ok(session) => match session.identify().await {
                    Ok(identity) => {
                        info!(index, account = identity.id, "transport session confirmed");
                        confirmed = Some((session, identity));
                        break;
                    },
                    Err(e) => {
                        warn!(index, error = %e, "connected but identity check failed");
                        let _ = session.disconnect().await;
                    },
                },
                Err(e) => {
                    warn!(index, error = %e, "credential candidate rejected");
                },
            }
        }

        let (session, identity) = confirmed.ok_or(Error::AuthExhausted { attempts })?;

        let peer = match Self::locate_peer(session.as_ref(), reference).await {
            Ok(peer) => peer,
            Err(e) => {
                let _ = session.disconnect().await;
                return Err(e);
            },
        };

        info!(peer = peer.id, "peer resolved");
        Ok(Self {
            session: Some(session),
            identity,
            peer,
        })
    }

    async fn locate_peer(session: &dyn ChatSession, reference: &PeerRef) -> Result<Peer> {
        match session.resolve_peer(reference).await {
            Ok(peer) => Ok(peer),
            Err(Error::PeerNotFound { .. }) => {
                debug!(reference = %reference, "primary peer lookup missed, trying search");
                session
                    .search_peer(&reference.to_string())
                    .await
                    .map_err(|_| Error::PeerUnresolved {
                        reference: reference.to_string(),
                    })
            },
            Err(e) => Err(e),
        }
    }

    fn session(&self) -> Result<&dyn ChatSession> {
        self.session.as_deref().ok_or(Error::SessionClosed)
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub async fn send_text(&self, text: &str) -> Result<i64> {
        self.session()?.send_text(&self.peer, text).await
    }

    pub async fn send_attachment(&self, filename: &str, bytes: &[u8]) -> Result<i64> {
        self.session()?
            .send_attachment(&self.peer, filename, bytes)
            .await
    }

    pub async fn recent_messages(&self, limit: usize) -> Result<Vec<InboundMessage>> {
        self.session()?.recent_messages(&self.peer, limit).await
    }

    pub async fn click_choice(&self, message_id: i64, label: &str) -> Result<()> {
        self.session()?
            .click_choice(&self.peer, message_id, label)
            .await
    }

    /// Release the underlying session. Idempotent.
    pub async fn close(&mut self) {
        if let Some(session) = self.session.take()
            && let Err(e) = session.disconnect().await
        {
            warn!(error = %e, "disconnect failed");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.session.is_some() {
            warn!("session guard dropped without close; transport session leaked");
        }
    }
}
