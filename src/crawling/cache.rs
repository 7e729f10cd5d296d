//! Working snapshot shared by all entity tasks

use tokio::sync::RwLock;

use crate::domain::{PlayerRecord, Snapshot};

/// In-memory player records for the current run.
///
/// Seeded from the previous snapshot; every task reads and replaces entries
/// through the lock so concurrent updates to different keys are never lost.
#[derive(Debug, Default)]
pub struct PlayerCache {
    records: RwLock<Snapshot>,
}

impl PlayerCache {
    pub fn new(seed: Snapshot) -> Self {
        Self {
            records: RwLock::new(seed),
        }
    }

    pub async fn get(&self, nickname: &str) -> Option<PlayerRecord> {
        self.records.read().await.get(nickname).cloned()
    }

    /// Insert or replace a record, returning the one it replaced
    pub async fn upsert(&self, nickname: impl Into<String>, record: PlayerRecord) -> Option<PlayerRecord> {
        self.records.write().await.insert(nickname.into(), record)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
