//! dfdrift - DataFrame Schema Drift Detection
//!
//! Records the structural fingerprint of a table every time a pipeline
//! checkpoint validates one, and alerts when the columns or their types
//! differ from the previous run of the same checkpoint.
//!
//! - Snapshot: column names, type tags, null counts and row count of one table
//! - History: latest snapshot per checkpoint, kept in a local JSON file or a bucket
//! - Notifier: console or Slack, never allowed to fail a pipeline
//!
//! ```no_run
//! use dfdrift::{CheckpointId, CsvTable, DriftDetector, Settings};
//!
//! # fn main() -> dfdrift::DriftResult<()> {
//! let detector = DriftDetector::from_settings(&Settings::load()?)?;
//! let users = CsvTable::from_path("users.csv")?;
//! detector.validate_table(&CheckpointId::new("load_users"), &users)?;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod config;
pub mod detector;
pub mod error;
pub mod intercept;
pub mod notify;
pub mod snapshot;
pub mod store;
pub mod table;

pub use checkpoint::CheckpointId;
pub use config::{ConfigError, NotifierSettings, Settings, SettingsOverrides, StoreSettings};
pub use detector::{DriftDetector, Validation};
pub use error::{DriftError, DriftResult};
pub use intercept::Interceptor;
pub use notify::{ChatNotifier, ConsoleNotifier, Notifier};
pub use snapshot::{ColumnDescriptor, DiffEngine, DriftReport, SchemaSnapshot};
pub use store::{History, LocalFileStore, MemoryStore, ObjectStore, SnapshotStore};
pub use table::{CsvTable, JsonTable, TableAdapter};
