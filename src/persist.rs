//! State persistence
//!
//! The whole statistics + alerts state is serialized as one JSON blob
//! under a caller-supplied key, against an opaque key/value store the
//! host provides. Writes are debounced in a background task and are
//! strictly best-effort: a failed write is logged, never retried and
//! never surfaced to the mutation path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::models::{AgentStatistics, Alert};

/// Wait this long after the last mutation before writing.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Serialized layout of the persisted blob
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub stats: Vec<AgentStatistics>,
    pub alerts: Vec<Alert>,
}

/// Narrow get/put contract over whatever store the host uses.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the blob stored under `key`, if any.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous blob.
    async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()>;
}

/// In-memory store, useful for tests and single-process hosts
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

/// Load the persisted state from the store. A missing key, a failed
/// read or a corrupt blob all yield None; none of them are fatal.
pub async fn load(store: &dyn KeyValueStore, key: &str) -> Option<PersistedState> {
    let bytes = match store.get(key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            tracing::debug!("No persisted state under {}", key);
            return None;
        }
        Err(e) => {
            tracing::warn!("Failed to read persisted state from {}: {}", key, e);
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!("Corrupt persisted state under {}: {}", key, e);
            None
        }
    }
}

/// Serialize and write immediately, logging failures.
pub async fn save_now(store: &dyn KeyValueStore, key: &str, state: &PersistedState) {
    let bytes = match serde_json::to_vec(state) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to serialize state for {}: {}", key, e);
            return;
        }
    };
    if let Err(e) = store.put(key, bytes).await {
        tracing::warn!("Failed to persist state to {}: {}", key, e);
    }
}

/// Debounced background writer. `schedule` replaces any pending
/// snapshot; only the latest of a rapid burst is written, one debounce
/// window after the burst ends.
pub struct PersistenceWriter {
    tx: watch::Sender<Option<Vec<u8>>>,
    cancel: CancellationToken,
}

impl PersistenceWriter {
    pub fn spawn(store: Arc<dyn KeyValueStore>, key: String, debounce: Duration) -> Self {
        let (tx, mut rx) = watch::channel::<Option<Vec<u8>>>(None);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                // Absorb further updates for one debounce window
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(debounce) => break,
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }

                let pending = rx.borrow_and_update().clone();
                if let Some(bytes) = pending {
                    if let Err(e) = store.put(&key, bytes).await {
                        tracing::warn!("Debounced persistence write to {} failed: {}", key, e);
                    } else {
                        tracing::debug!("Persisted state to {}", key);
                    }
                }
            }
        });

        Self { tx, cancel }
    }

    /// Queue the latest snapshot for writing.
    pub fn schedule(&self, state: &PersistedState) {
        match serde_json::to_vec(state) {
            Ok(bytes) => {
                let _ = self.tx.send(Some(bytes));
            }
            Err(e) => tracing::warn!("Failed to serialize state for persistence: {}", e),
        }
    }

    /// Stop the writer task. Pending snapshots are dropped; callers
    /// that need a final write use `save_now` first.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
