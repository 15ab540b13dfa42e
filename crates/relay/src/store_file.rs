//! JSON file-backed counter store with atomic writes.

use std::path::PathBuf;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    tokio::fs,
    tracing::warn,
};

use crate::{
    error::{Context, Result},
    store::CounterStore,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct FailureRecord {
    consecutive_failures: u32,
}

/// File-backed store. One small JSON record, written atomically.
pub struct FileCounterStore {
    path: PathBuf,
}

impl FileCounterStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Create a store under the given state directory.
    #[must_use]
    pub fn in_dir(dir: PathBuf) -> Self {
        Self::new(dir.join("failures.json"))
    }

    /// Create a store using the default `~/.parley/relay/` layout.
    pub fn default_path() -> Result<Self> {
        let home = dirs_next::home_dir().context("cannot determine home directory")?;
        Ok(Self::in_dir(home.join(".parley").join("relay")))
    }

    /// Atomic write: write to temp, rename over target, keep `.bak`.
    async fn atomic_write(&self, record: &FailureRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(record)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, json.as_bytes()).await?;

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let bak = self.path.with_extension("json.bak");
            let _ = fs::rename(&self.path, &bak).await;
        }

        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CounterStore for FileCounterStore {
    async fn get(&self) -> Result<u32> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(0);
        }
        let data = fs::read_to_string(&self.path).await?;
        match serde_json::from_str::<FailureRecord>(&data) {
            Ok(record) => Ok(record.consecutive_failures),
            Err(e) => {
                // A corrupt counter must not kill cycles; start over at zero.
                warn!(path = %self.path.display(), error = %e, "unreadable failure record");
                Ok(0)
            },
        }
    }

    async fn set(&self, count: u32) -> Result<()> {
        self.atomic_write(&FailureRecord {
            consecutive_failures: count,
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.set(0).await
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {std::path::Path, tempfile::TempDir};

    use super::*;

    fn make_store(dir: &Path) -> FileCounterStore {
        FileCounterStore::in_dir(dir.to_path_buf())
    }

    #[tokio::test]
    async fn missing_record_reads_as_zero() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(tmp.path());
        assert_eq!(store.get().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(tmp.path());
        store.set(2).await.unwrap();
        assert_eq!(store.get().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn clear_resets_to_zero() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(tmp.path());
        store.set(5).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn backup_created_on_overwrite() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(tmp.path());
        store.set(1).await.unwrap();
        store.set(2).await.unwrap();
        assert!(tmp.path().join("failures.json.bak").exists());
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_zero() {
        let tmp = TempDir::new().unwrap();
        let store = make_store(tmp.path());
        fs::create_dir_all(tmp.path()).await.unwrap();
        fs::write(tmp.path().join("failures.json"), b"{not json")
            .await
            .unwrap();
        assert_eq!(store.get().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn survives_reopen() {
        let tmp = TempDir::new().unwrap();
        make_store(tmp.path()).set(3).await.unwrap();
        assert_eq!(make_store(tmp.path()).get().await.unwrap(), 3);
    }
}
