//! Cursor persistence: stores each tracker's resume position.
//!
//! A checkpoint holds the position of the last event a tracker applied
//! successfully. On restart the tracker resumes strictly after it rather than
//! re-reading the whole event history.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cursor::EventCursor;
use crate::error::IndexerError;

/// A persisted cursor row for one tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Tracker identity (the Move event name, e.g. `"EventVoteCast"`).
    pub tracker_id: String,
    /// Position of the last applied event.
    pub cursor: EventCursor,
    /// Unix timestamp (seconds) of when this checkpoint was saved.
    pub updated_at: i64,
}

/// Trait for storing and loading tracker cursors.
///
/// Implementations include [`MemoryCursorStore`] and the SQLite / Postgres
/// backends in `ballotindex-storage`.
#[async_trait]
pub trait CursorStore: Send + Sync {
    /// Load the checkpoint for a tracker, if one was ever saved.
    async fn load(&self, tracker_id: &str) -> Result<Option<Checkpoint>, IndexerError>;

    /// Save (upsert) a checkpoint.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError>;

    /// Delete a checkpoint so the tracker re-indexes from the beginning.
    async fn delete(&self, tracker_id: &str) -> Result<(), IndexerError>;

    /// All saved checkpoints, ordered by tracker id.
    async fn list(&self) -> Result<Vec<Checkpoint>, IndexerError>;
}

/// Binds a [`CursorStore`] to a single tracker.
#[derive(Clone)]
pub struct CursorManager {
    store: Arc<dyn CursorStore>,
    tracker_id: String,
}

impl CursorManager {
    pub fn new(store: Arc<dyn CursorStore>, tracker_id: impl Into<String>) -> Self {
        Self {
            store,
            tracker_id: tracker_id.into(),
        }
    }

    pub fn tracker_id(&self) -> &str {
        &self.tracker_id
    }

    /// Load the saved cursor (`None` = start from the beginning of history).
    pub async fn load(&self) -> Result<Option<EventCursor>, IndexerError> {
        Ok(self.store.load(&self.tracker_id).await?.map(|cp| cp.cursor))
    }

    /// Persist `cursor` as this tracker's resume position.
    pub async fn save(&self, cursor: &EventCursor) -> Result<(), IndexerError> {
        let cp = Checkpoint {
            tracker_id: self.tracker_id.clone(),
            cursor: cursor.clone(),
            updated_at: chrono::Utc::now().timestamp(),
        };
        self.store.save(cp).await
    }
}

// ─── In-memory store (for testing) ────────────────────────────────────────────

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// In-memory cursor store for tests and ephemeral indexers.
#[derive(Default)]
pub struct MemoryCursorStore {
    data: Mutex<BTreeMap<String, Checkpoint>>,
}

impl MemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<MutexGuard<'_, BTreeMap<String, Checkpoint>>, IndexerError> {
        self.data
            .lock()
            .map_err(|_| IndexerError::Storage("cursor map lock poisoned".into()))
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self, tracker_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        Ok(self.data()?.get(tracker_id).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        self.data()?.insert(checkpoint.tracker_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, tracker_id: &str) -> Result<(), IndexerError> {
        self.data()?.remove(tracker_id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Checkpoint>, IndexerError> {
        Ok(self.data()?.values().cloned().collect())
    }
}
