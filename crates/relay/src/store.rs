//! Persistence trait for the consecutive-failure counter.

use async_trait::async_trait;

use crate::Result;

/// Durable store for the one piece of state shared across invocations.
///
/// Single-writer discipline is assumed: one cycle reads the counter at
/// start and writes it at end, with no concurrent cycles.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current consecutive-failure count. A missing record reads as zero.
    async fn get(&self) -> Result<u32>;

    async fn set(&self, count: u32) -> Result<()>;

    /// Reset the count to zero.
    async fn clear(&self) -> Result<()>;
}
