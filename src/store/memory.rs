//! In-memory snapshot store
//!
//! Keeps the history for the lifetime of the process. Useful for pipelines
//! that run many validations in one process and for tests.

use super::{History, SnapshotStore};
use crate::checkpoint::CheckpointId;
use crate::error::{load_error, save_error, DriftResult};
use crate::snapshot::SchemaSnapshot;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Thread-safe history held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    history: Arc<RwLock<Option<History>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing history
    pub fn with_history(history: History) -> Self {
        Self {
            history: Arc::new(RwLock::new(Some(history))),
        }
    }
}

impl SnapshotStore for MemoryStore {
    fn fetch(&self) -> DriftResult<Option<History>> {
        let history = self
            .history
            .read()
            .map_err(|_| load_error("in-memory history lock poisoned"))?;
        Ok(history.clone())
    }

    fn save(&self, checkpoint_id: &CheckpointId, snapshot: &SchemaSnapshot) -> DriftResult<()> {
        let mut history = self
            .history
            .write()
            .map_err(|_| save_error("in-memory history lock poisoned"))?;

        history
            .get_or_insert_with(History::new)
            .insert(checkpoint_id.clone(), snapshot.clone());

        debug!(
            "Saved snapshot for {} in memory: {} columns",
            checkpoint_id,
            snapshot.column_count()
        );
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
