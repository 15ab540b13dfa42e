//! Script-driven in-memory transport.
//!
//! Stands in for the real messaging transport in tests and in the binary's
//! rehearsal mode. A [`Script`] declares which credentials authenticate,
//! whether identity and peer lookups succeed, and the reply groups the peer
//! produces: each outgoing action (text, attachment, or click) pops the next
//! group and appends it to the conversation timeline.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use {async_trait::async_trait, serde::Deserialize};

use crate::{
    error::{Error, Result},
    peer::{Peer, PeerRef},
    session::{ChatSession, ChatTransport, Identity, InboundMessage},
};

/// One scripted peer message.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScriptMessage {
    pub text: String,
    pub pending: bool,
    pub choices: Vec<String>,
}

/// Declarative behavior of the scripted transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Script {
    /// Credentials that authenticate. Empty accepts anything.
    pub accept: Vec<String>,
    /// Whether the post-connect identity check succeeds.
    pub identity_ok: bool,
    /// Whether the primary peer lookup succeeds.
    pub resolvable: bool,
    /// Whether the fallback name search succeeds.
    pub searchable: bool,
    pub peer_id: i64,
    pub peer_title: Option<String>,
    /// Reply groups, popped in order: one group per outgoing action.
    pub replies: Vec<Vec<ScriptMessage>>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            accept: Vec::new(),
            identity_ok: true,
            resolvable: true,
            searchable: true,
            peer_id: 100,
            peer_title: None,
            replies: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct Recorder {
    connect_attempts: Vec<String>,
    sent_texts: Vec<String>,
    attachments: Vec<(String, usize)>,
    clicks: Vec<(i64, String)>,
    closed: bool,
}

struct State {
    timeline: Vec<InboundMessage>,
    pending_replies: VecDeque<Vec<ScriptMessage>>,
    next_id: i64,
}

struct Inner {
    script: Script,
    state: Mutex<State>,
    recorder: Mutex<Recorder>,
}

impl Inner {
    fn advance_script(&self, state: &mut State) {
        if let Some(group) = state.pending_replies.pop_front() {
            for msg in group {
                state.next_id += 1;
                state.timeline.push(InboundMessage {
                    id: state.next_id,
                    text: msg.text,
                    outgoing: false,
                    pending: msg.pending,
                    choices: msg.choices,
                });
            }
        }
    }

    fn record_outgoing(&self, state: &mut State, text: &str) -> i64 {
        state.next_id += 1;
        let id = state.next_id;
        state.timeline.push(InboundMessage {
            id,
            text: text.to_string(),
            outgoing: true,
            pending: false,
            choices: Vec::new(),
        });
        id
    }
}

/// Transport over a [`Script`]. All sessions share one conversation state,
/// so tests can inspect traffic through the transport handle afterwards.
#[derive(Clone)]
pub struct ScriptedTransport {
    inner: Arc<Inner>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new(script: Script) -> Self {
        let pending_replies = script.replies.clone().into();
        Self {
            inner: Arc::new(Inner {
                script,
                state: Mutex::new(State {
                    timeline: Vec::new(),
                    pending_replies,
                    next_id: 0,
                }),
                recorder: Mutex::new(Recorder::default()),
            }),
        }
    }

    #[must_use]
    pub fn connect_attempts(&self) -> Vec<String> {
        self.recorder().connect_attempts.clone()
    }

    #[must_use]
    pub fn sent_texts(&self) -> Vec<String> {
        self.recorder().sent_texts.clone()
    }

    #[must_use]
    pub fn attachments(&self) -> Vec<(String, usize)> {
        self.recorder().attachments.clone()
    }

    #[must_use]
    pub fn clicks(&self) -> Vec<(i64, String)> {
        self.recorder().clicks.clone()
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.recorder().closed
    }

    fn recorder(&self) -> std::sync::MutexGuard<'_, Recorder> {
        self.inner.recorder.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn connect(&self, credential: &str) -> Result<Box<dyn ChatSession>> {
        self.recorder()
            .connect_attempts
            .push(credential.to_string());
        let accepted = self.inner.script.accept.is_empty()
            || self.inner.script.accept.iter().any(|c| c.as_str() == credential);
        if !accepted {
            return Err(Error::AuthRejected);
        }
        Ok(Box::new(ScriptedSession {
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct ScriptedSession {
    inner: Arc<Inner>,
}

impl ScriptedSession {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn recorder(&self) -> std::sync::MutexGuard<'_, Recorder> {
        self.inner.recorder.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn peer(&self) -> Peer {
        Peer {
            id: self.inner.script.peer_id,
            title: self.inner.script.peer_title.clone(),
        }
    }
}

#[async_trait]
impl ChatSession for ScriptedSession {
    async fn identify(&self) -> Result<Identity> {
        if self.inner.script.identity_ok {
            Ok(Identity {
                id: 1,
                username: Some("parley".into()),
            })
        } else {
            Err(Error::message("identity check failed"))
        }
    }

    async fn resolve_peer(&self, reference: &PeerRef) -> Result<Peer> {
        if self.inner.script.resolvable {
            Ok(self.peer())
        } else {
            Err(Error::peer_not_found(reference.to_string()))
        }
    }

    async fn search_peer(&self, name: &str) -> Result<Peer> {
        if self.inner.script.searchable {
            Ok(self.peer())
        } else {
            Err(Error::peer_not_found(name))
        }
    }

    async fn send_text(&self, _peer: &Peer, text: &str) -> Result<i64> {
        self.recorder().sent_texts.push(text.to_string());
        let mut state = self.state();
        let id = self.inner.record_outgoing(&mut state, text);
        self.inner.advance_script(&mut state);
        Ok(id)
    }

    async fn send_attachment(&self, _peer: &Peer, filename: &str, bytes: &[u8]) -> Result<i64> {
        self.recorder()
            .attachments
            .push((filename.to_string(), bytes.len()));
        let mut state = self.state();
        let id = self.inner.record_outgoing(&mut state, "<attachment>");
        self.inner.advance_script(&mut state);
        Ok(id)
    }

    async fn recent_messages(&self, _peer: &Peer, limit: usize) -> Result<Vec<InboundMessage>> {
        let state = self.state();
        let newest_first: Vec<InboundMessage> =
            state.timeline.iter().rev().take(limit).cloned().collect();
        Ok(newest_first)
    }

    async fn click_choice(&self, _peer: &Peer, message_id: i64, label: &str) -> Result<()> {
        let known = {
            let state = self.state();
            state
                .timeline
                .iter()
                .any(|m| m.id == message_id && m.choices.iter().any(|c| c.as_str() == label))
        };
        if !known {
            return Err(Error::message(format!(
                "no choice {label:?} on message {message_id}"
            )));
        }
        self.recorder().clicks.push((message_id, label.to_string()));
        let mut state = self.state();
        self.inner.advance_script(&mut state);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.recorder().closed = true;
        Ok(())
    }
}
