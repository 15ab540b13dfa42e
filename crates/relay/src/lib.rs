//! The conversational relay driver.
//!
//! One cycle: establish a transport session, optionally walk the peer
//! through its configuration menu, deliver the payload, poll free-form
//! replies for a structured acknowledgment, persist failure bookkeeping,
//! and report the result over telemetry and the downstream webhook.
//! Repeated invocation is the caller's responsibility; nothing here loops
//! across cycles.

pub mod cycle;
pub mod error;
pub mod exchange;
pub mod navigation;
pub mod packet;
pub mod recovery;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod telemetry;

pub use {
    cycle::{CycleOutcome, CycleReport},
    error::{Error, Result},
    packet::ResponsePacket,
    store::CounterStore,
    telemetry::Forwarder,
};
