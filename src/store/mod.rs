//! Snapshot Store Module
//!
//! Durable mapping from checkpoint id to the latest snapshot recorded for it.
//! Every backend persists the whole history as one JSON document, so a save
//! is always read-modify-write of that document.
//!
//! Concurrent writers are not coordinated: two processes saving different
//! checkpoints at the same time can each merge into a stale copy, and the
//! last write wins for the whole document. Callers that share a document
//! across workers need their own locking.

pub mod local;
pub mod memory;
pub mod object;

pub use local::LocalFileStore;
pub use memory::MemoryStore;
pub use object::{BlobClient, GcsClient, ObjectStore};

use crate::checkpoint::CheckpointId;
use crate::config::{Settings, StoreSettings};
use crate::error::DriftResult;
use crate::snapshot::SchemaSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Latest snapshot per checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(BTreeMap<CheckpointId, SchemaSnapshot>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, checkpoint_id: &CheckpointId) -> Option<&SchemaSnapshot> {
        self.0.get(checkpoint_id)
    }

    /// Insert or overwrite the entry for `checkpoint_id`
    pub fn insert(&mut self, checkpoint_id: CheckpointId, snapshot: SchemaSnapshot) -> Option<SchemaSnapshot> {
        self.0.insert(checkpoint_id, snapshot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CheckpointId, &SchemaSnapshot)> {
        self.0.iter()
    }

    /// Parse a history document
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Render the history document
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Storage backend for the history document
pub trait SnapshotStore: Send + Sync {
    /// Strict read of the history document.
    /// `Ok(None)` means the backing resource does not exist yet.
    fn fetch(&self) -> DriftResult<Option<History>>;

    /// Merge `snapshot` under `checkpoint_id` into the full document and write it back
    fn save(&self, checkpoint_id: &CheckpointId, snapshot: &SchemaSnapshot) -> DriftResult<()>;

    /// Where the document lives, for logs
    fn location(&self) -> String;

    /// Soft read: a missing, unreachable, or corrupt document is an empty history
    fn load(&self) -> History {
        match self.fetch() {
            Ok(Some(history)) => history,
            Ok(None) => History::new(),
            Err(e) => {
                warn!(
                    code = e.code(),
                    "Could not read snapshot history at {}, starting from an empty history: {}",
                    self.location(),
                    e
                );
                History::new()
            }
        }
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Box<S> {
    fn fetch(&self) -> DriftResult<Option<History>> {
        (**self).fetch()
    }

    fn save(&self, checkpoint_id: &CheckpointId, snapshot: &SchemaSnapshot) -> DriftResult<()> {
        (**self).save(checkpoint_id, snapshot)
    }

    fn location(&self) -> String {
        (**self).location()
    }

    fn load(&self) -> History {
        (**self).load()
    }
}

impl<S: SnapshotStore + ?Sized> SnapshotStore for Arc<S> {
    fn fetch(&self) -> DriftResult<Option<History>> {
        (**self).fetch()
    }

    fn save(&self, checkpoint_id: &CheckpointId, snapshot: &SchemaSnapshot) -> DriftResult<()> {
        (**self).save(checkpoint_id, snapshot)
    }

    fn location(&self) -> String {
        (**self).location()
    }

    fn load(&self) -> History {
        (**self).load()
    }
}

/// Build the store selected by `settings`
pub fn from_settings(settings: &Settings) -> DriftResult<Box<dyn SnapshotStore>> {
    let store: Box<dyn SnapshotStore> = match &settings.store {
        StoreSettings::Local { dir } => Box::new(LocalFileStore::new(dir)),
        StoreSettings::Object(object) => Box::new(ObjectStore::gcs(object, settings.http_timeout)?),
    };
    Ok(store)
}

/// Suffix for a corrupt document preserved before it is replaced
pub(crate) fn corrupt_suffix() -> String {
    format!("corrupt-{}", chrono::Utc::now().format("%Y%m%dT%H%M%SZ"))
}
