//! Schema Diff Engine
//!
//! Compares two snapshots of the same checkpoint. Drift is decided on column
//! names and type tags only; row counts and null counts never produce a report.

use super::model::SchemaSnapshot;
use crate::checkpoint::CheckpointId;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Type of column change detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Retyped,
}

/// Old and new type tag of a retyped column
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeChange {
    pub old: String,
    pub new: String,
}

/// A single column change, in rendering order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnChange<'a> {
    pub change_type: ChangeType,
    pub column: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_change: Option<&'a TypeChange>,
}

/// Structural difference between two snapshots of one checkpoint.
/// Only the diff engine constructs it, and only when something changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    checkpoint_id: CheckpointId,
    added_columns: BTreeSet<String>,
    removed_columns: BTreeSet<String>,
    type_changes: BTreeMap<String, TypeChange>,
    old_row_count: u64,
    new_row_count: u64,
}

impl DriftReport {
    pub fn checkpoint_id(&self) -> &CheckpointId {
        &self.checkpoint_id
    }

    pub fn added_columns(&self) -> &BTreeSet<String> {
        &self.added_columns
    }

    pub fn removed_columns(&self) -> &BTreeSet<String> {
        &self.removed_columns
    }

    pub fn type_changes(&self) -> &BTreeMap<String, TypeChange> {
        &self.type_changes
    }

    pub fn old_row_count(&self) -> u64 {
        self.old_row_count
    }

    pub fn new_row_count(&self) -> u64 {
        self.new_row_count
    }

    /// Every change: added, then removed, then retyped, each sorted by column name
    pub fn changes(&self) -> Vec<ColumnChange<'_>> {
        let added = self.added_columns.iter().map(|c| ColumnChange {
            change_type: ChangeType::Added,
            column: c,
            type_change: None,
        });
        let removed = self.removed_columns.iter().map(|c| ColumnChange {
            change_type: ChangeType::Removed,
            column: c,
            type_change: None,
        });
        let retyped = self.type_changes.iter().map(|(c, change)| ColumnChange {
            change_type: ChangeType::Retyped,
            column: c,
            type_change: Some(change),
        });

        added.chain(removed).chain(retyped).collect()
    }

    /// Human-readable, multi-line message
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Machine-parsable summary of the same report
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "checkpoint_id": self.checkpoint_id.as_str(),
            "added_columns": self.added_columns,
            "removed_columns": self.removed_columns,
            "type_changes": self.type_changes,
            "row_count": {
                "old": self.old_row_count,
                "new": self.new_row_count,
            },
        })
    }
}

impl fmt::Display for DriftReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(names: &BTreeSet<String>) -> String {
            if names.is_empty() {
                "-".to_string()
            } else {
                names.iter().cloned().collect::<Vec<_>>().join(", ")
            }
        }

        writeln!(f, "DataFrame schema changed at {}", self.checkpoint_id)?;
        writeln!(f, "  added columns:   {}", list(&self.added_columns))?;
        writeln!(f, "  removed columns: {}", list(&self.removed_columns))?;
        if self.type_changes.is_empty() {
            writeln!(f, "  type changes:    -")?;
        } else {
            writeln!(f, "  type changes:")?;
            for (column, change) in &self.type_changes {
                writeln!(f, "    {}: {} → {}", column, change.old, change.new)?;
            }
        }
        write!(f, "  rows: {} → {}", self.old_row_count, self.new_row_count)
    }
}

/// The diff engine that compares schema snapshots
pub struct DiffEngine;

impl DiffEngine {
    /// Compare `old` against `new`. Returns `None` when names and type tags match.
    pub fn diff(
        checkpoint_id: &CheckpointId,
        old: &SchemaSnapshot,
        new: &SchemaSnapshot,
    ) -> Option<DriftReport> {
        let old_types = old.type_map();
        let new_types = new.type_map();

        let old_names: BTreeSet<&str> = old_types.keys().copied().collect();
        let new_names: BTreeSet<&str> = new_types.keys().copied().collect();

        let added_columns: BTreeSet<String> = new_names
            .difference(&old_names)
            .map(|name| name.to_string())
            .collect();

        let removed_columns: BTreeSet<String> = old_names
            .difference(&new_names)
            .map(|name| name.to_string())
            .collect();

        let type_changes: BTreeMap<String, TypeChange> = old_names
            .intersection(&new_names)
            .filter_map(|name| {
                let (from, to) = (old_types[name], new_types[name]);
                (from != to).then(|| {
                    (
                        name.to_string(),
                        TypeChange {
                            old: from.to_string(),
                            new: to.to_string(),
                        },
                    )
                })
            })
            .collect();

        if added_columns.is_empty() && removed_columns.is_empty() && type_changes.is_empty() {
            return None;
        }

        Some(DriftReport {
            checkpoint_id: checkpoint_id.clone(),
            added_columns,
            removed_columns,
            type_changes,
            old_row_count: old.row_count(),
            new_row_count: new.row_count(),
        })
    }
}
