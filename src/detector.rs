//! Drift detector
//!
//! Ties one validation together: read history, diff against the previous
//! snapshot of the checkpoint, alert on drift, then always persist the new
//! snapshot. Nothing is cached between calls; each validation re-reads the
//! store.

use crate::checkpoint::CheckpointId;
use crate::config::Settings;
use crate::error::DriftResult;
use crate::notify::{self, ConsoleNotifier, Notifier};
use crate::snapshot::{DiffEngine, SchemaSnapshot};
use crate::store::{self, LocalFileStore, SnapshotStore};
use crate::table::TableAdapter;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// What a validation call found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Validation {
    /// First snapshot for the checkpoint; nothing to compare against
    Baseline,
    Unchanged,
    /// A report was rendered and handed to the notifier
    Drifted {
        added: usize,
        removed: usize,
        retyped: usize,
    },
}

impl Validation {
    pub fn is_drift(&self) -> bool {
        matches!(self, Validation::Drifted { .. })
    }
}

pub struct DriftDetector {
    store: Box<dyn SnapshotStore>,
    notifier: Box<dyn Notifier>,
}

impl DriftDetector {
    pub fn new(store: impl SnapshotStore + 'static, notifier: impl Notifier + 'static) -> Self {
        Self {
            store: Box::new(store),
            notifier: Box::new(notifier),
        }
    }

    /// Build the store and notifier selected by `settings`.
    /// Missing or invalid configuration fails here, not on first use.
    pub fn from_settings(settings: &Settings) -> DriftResult<Self> {
        let store = store::from_settings(settings)?;
        let notifier = notify::from_settings(settings)?;

        info!(
            "Drift detector ready: history at {}, alerts via {}",
            store.location(),
            notifier.name()
        );
        Ok(Self { store, notifier })
    }

    pub fn store(&self) -> &dyn SnapshotStore {
        self.store.as_ref()
    }

    /// Compare `snapshot` with the last one recorded for `checkpoint_id`,
    /// alert on drift, and record `snapshot` as the new latest.
    ///
    /// Notification failures are logged and reported on the console instead;
    /// they never fail the call. A failed save is returned to the caller.
    pub fn validate(&self, checkpoint_id: &CheckpointId, snapshot: &SchemaSnapshot) -> DriftResult<Validation> {
        let history = self.store.load();

        let outcome = match history.get(checkpoint_id) {
            None => {
                info!(
                    "Recording baseline for {}: {} columns, {} rows",
                    checkpoint_id,
                    snapshot.column_count(),
                    snapshot.row_count()
                );
                Validation::Baseline
            }
            Some(previous) => match DiffEngine::diff(checkpoint_id, previous, snapshot) {
                None => {
                    debug!(
                        "No drift at {} (rows {} → {})",
                        checkpoint_id,
                        previous.row_count(),
                        snapshot.row_count()
                    );
                    Validation::Unchanged
                }
                Some(report) => {
                    warn!(
                        checkpoint = %checkpoint_id,
                        added = report.added_columns().len(),
                        removed = report.removed_columns().len(),
                        retyped = report.type_changes().len(),
                        "Schema drift detected"
                    );

                    if let Err(e) = self.notifier.notify(&report) {
                        warn!(
                            code = e.code(),
                            "Notifier '{}' failed, reporting drift on the console: {}",
                            self.notifier.name(),
                            e
                        );
                        // Console delivery cannot fail
                        let _ = ConsoleNotifier::stderr().notify(&report);
                    }

                    Validation::Drifted {
                        added: report.added_columns().len(),
                        removed: report.removed_columns().len(),
                        retyped: report.type_changes().len(),
                    }
                }
            },
        };

        if let Err(e) = self.store.save(checkpoint_id, snapshot) {
            error!(
                code = e.code(),
                "Failed to record snapshot for {} at {}: {}",
                checkpoint_id,
                self.store.location(),
                e
            );
            return Err(e);
        }

        Ok(outcome)
    }

    /// Snapshot `table` and validate it under `checkpoint_id`
    pub fn validate_table<T: TableAdapter + ?Sized>(
        &self,
        checkpoint_id: &CheckpointId,
        table: &T,
    ) -> DriftResult<Validation> {
        let snapshot = SchemaSnapshot::build(table)?;
        self.validate(checkpoint_id, &snapshot)
    }

    /// Validate `table` under the id of the calling source line
    #[track_caller]
    pub fn validate_here<T: TableAdapter + ?Sized>(&self, table: &T) -> DriftResult<Validation> {
        let checkpoint_id = CheckpointId::caller();
        self.validate_table(&checkpoint_id, table)
    }
}

impl Default for DriftDetector {
    /// Local history in `.dfdrift_schemas/schemas.json`, alerts on stderr
    fn default() -> Self {
        Self::new(LocalFileStore::default(), ConsoleNotifier::stderr())
    }
}
