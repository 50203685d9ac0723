//! Schema Snapshot Module
//!
//! The heart of dfdrift - detecting what changed in a table's structure.
//! This module provides:
//! - Schema snapshots (point-in-time structural fingerprints)
//! - Schema diff engine (comparing two snapshots of one checkpoint)
//! - Drift reports (what was added, removed, or retyped)

pub mod diff;
pub mod model;

pub use diff::{ChangeType, ColumnChange, DiffEngine, DriftReport, TypeChange};
pub use model::{normalize_type_tag, ColumnDescriptor, SchemaSnapshot};
