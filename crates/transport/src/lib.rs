//! Chat transport seam for parley.
//!
//! The messaging transport itself lives outside this workspace; what parley
//! needs from it is expressed as the [`ChatTransport`]/[`ChatSession`]
//! capability traits. This crate owns everything up to and including an
//! authenticated session pointed at the right peer: credential candidate
//! derivation, the connect-and-verify loop, and two-stage peer resolution.
//!
//! [`scripted`] provides an in-memory implementation driven by a declarative
//! script, used by the test suites and by the binary's rehearsal mode.

pub mod credential;
pub mod error;
pub mod peer;
pub mod scripted;
pub mod session;

pub use {
    error::{Error, Result},
    peer::{Peer, PeerRef},
    session::{
        ChatSession, ChatTransport, Identity, InboundMessage, MAX_INLINE_MESSAGE_LEN, SessionGuard,
    },
};
