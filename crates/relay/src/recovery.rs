//! Failure bookkeeping across invocations.
//!
//! The counter is the only state shared between independent cycles. It is
//! read once when the cycle starts and written once when it ends; the one
//! exception is the optimistic clear after a forced navigation reset, which
//! belongs to the recovery action itself.

use tracing::{info, warn};

use crate::store::CounterStore;

/// Consecutive failures that trigger a forced full reset.
pub const FAILURE_THRESHOLD: u32 = 3;

/// Tracks one cycle's failure bookkeeping against a [`CounterStore`].
pub struct RecoveryController<'a> {
    store: &'a dyn CounterStore,
    threshold: u32,
    count_at_start: u32,
}

impl<'a> RecoveryController<'a> {
    /// Read the persisted count. An unreadable store is treated as zero:
    /// losing a counter must never break the cycle itself.
    pub async fn start(store: &'a dyn CounterStore, threshold: u32) -> RecoveryController<'a> {
        let count_at_start = match store.get().await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "failure counter unreadable, assuming zero");
                0
            },
        };
        Self {
            store,
            threshold,
            count_at_start,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count_at_start
    }

    /// Whether the cycle must run the full reset plan before the exchange.
    #[must_use]
    pub fn needs_forced_reset(&self) -> bool {
        self.count_at_start >= self.threshold
    }

    /// Record that the forced reset plan completed. Best-effort recovery:
    /// completing the sequence is taken as success and the counter is
    /// cleared so the next cycles start from a clean slate.
    pub async fn note_recovered(&mut self) {
        info!(
            failures = self.count_at_start,
            "forced reset complete, clearing failure counter"
        );
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear failure counter");
        }
        self.count_at_start = 0;
    }

    /// Final write of the cycle: clear on success, increment on failure.
    pub async fn finish(self, success: bool) {
        let result = if success {
            self.store.clear().await
        } else {
            let next = self.count_at_start.saturating_add(1);
            info!(consecutive_failures = next, "cycle failed");
            self.store.set(next).await
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to persist failure counter");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_memory::InMemoryCounterStore;

    #[tokio::test]
    async fn consecutive_failures_accumulate() {
        let store = InMemoryCounterStore::new();
        for expected in 1..FAILURE_THRESHOLD {
            let controller = RecoveryController::start(&store, FAILURE_THRESHOLD).await;
            assert!(!controller.needs_forced_reset());
            controller.finish(false).await;
            assert_eq!(store.get().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn success_clears_regardless_of_prior_count() {
        let store = InMemoryCounterStore::with_count(2);
        let controller = RecoveryController::start(&store, FAILURE_THRESHOLD).await;
        controller.finish(true).await;
        assert_eq!(store.get().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn threshold_triggers_forced_reset() {
        let store = InMemoryCounterStore::with_count(FAILURE_THRESHOLD);
        let controller = RecoveryController::start(&store, FAILURE_THRESHOLD).await;
        assert!(controller.needs_forced_reset());
    }

    #[tokio::test]
    async fn recovery_clears_optimistically() {
        let store = InMemoryCounterStore::with_count(5);
        let mut controller = RecoveryController::start(&store, FAILURE_THRESHOLD).await;
        controller.note_recovered().await;
        assert_eq!(store.get().await.unwrap(), 0);
        assert!(!controller.needs_forced_reset());

        // A failure later in the same cycle restarts the count at one.
        controller.finish(false).await;
        assert_eq!(store.get().await.unwrap(), 1);
    }
}
