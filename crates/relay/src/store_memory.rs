//! In-memory counter store for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::{Result, store::CounterStore};

/// No persistence — for tests only.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    count: Mutex<u32>,
}

impl InMemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_count(count: u32) -> Self {
        Self {
            count: Mutex::new(count),
        }
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn get(&self) -> Result<u32> {
        Ok(*self.count.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn set(&self, count: u32) -> Result<()> {
        *self.count.lock().unwrap_or_else(|e| e.into_inner()) = count;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.set(0).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn starts_at_zero() {
        assert_eq!(InMemoryCounterStore::new().get().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn set_and_clear() {
        let store = InMemoryCounterStore::with_count(4);
        assert_eq!(store.get().await.unwrap(), 4);
        store.set(7).await.unwrap();
        assert_eq!(store.get().await.unwrap(), 7);
        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), 0);
    }
}
