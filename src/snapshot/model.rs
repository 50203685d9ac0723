//! Schema snapshot model
//!
//! A snapshot is the structural fingerprint of one table at one validation
//! call. Only `{name -> type_tag}` takes part in drift decisions; row and
//! null counts are kept for diagnostics.
//!
//! Persisted shape (one entry of the history document):
//!
//! ```json
//! {
//!   "columns": {
//!     "user_id": { "dtype": "int64", "null_count": 0, "total_count": 3 }
//!   },
//!   "shape": [3, 1]
//! }
//! ```

use crate::error::{table_error, DriftResult};
use crate::table::TableAdapter;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Normalize a raw type tag so that cosmetic differences never count as drift
pub fn normalize_type_tag(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// One column's facts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_tag: String,
    pub null_count: u64,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_tag: &str, null_count: u64) -> Self {
        Self {
            name: name.into(),
            type_tag: normalize_type_tag(type_tag),
            null_count,
        }
    }
}

/// Immutable structural fingerprint of one table.
///
/// `==` is exact equality: column order, row count and null counts all take
/// part. It is meant for round-trip checks. Whether two snapshots drifted is
/// decided only by `DiffEngine::diff` (or equal `fingerprint()`s).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "SnapshotDocument", try_from = "SnapshotDocument")]
pub struct SchemaSnapshot {
    columns: Vec<ColumnDescriptor>,
    row_count: u64,
}

impl SchemaSnapshot {
    /// Build a snapshot from explicit column facts. Column names must be unique.
    pub fn new(columns: Vec<ColumnDescriptor>, row_count: u64) -> DriftResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(table_error(format!("duplicate column name '{}'", column.name)));
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Capture the structure of any table adapter, in its declared column order
    pub fn build<T: TableAdapter + ?Sized>(table: &T) -> DriftResult<Self> {
        let row_count = table.row_count()?;
        let columns = table
            .column_names()?
            .into_iter()
            .map(|name| {
                let type_tag = table.type_tag(&name)?;
                let null_count = table.null_count(&name)?;
                Ok(ColumnDescriptor::new(name, &type_tag, null_count))
            })
            .collect::<DriftResult<Vec<_>>>()?;

        Self::new(columns, row_count)
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `name -> type_tag`, the only part of a snapshot drift is decided on
    pub fn type_map(&self) -> BTreeMap<&str, &str> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.type_tag.as_str()))
            .collect()
    }

    /// SHA-256 over the sorted `(name, type_tag)` pairs, each field length-prefixed.
    /// Equal fingerprints mean no drift, regardless of column order or counts.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, type_tag) in self.type_map() {
            for field in [name, type_tag] {
                hasher.update((field.len() as u64).to_le_bytes());
                hasher.update(field.as_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Per-column entry of the persisted document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnRecord {
    dtype: String,
    #[serde(default)]
    null_count: u64,
    #[serde(default)]
    total_count: u64,
}

/// Wire form of a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotDocument {
    #[serde(with = "ordered_columns")]
    columns: Vec<(String, ColumnRecord)>,
    #[serde(default)]
    shape: Vec<u64>,
}

impl From<SchemaSnapshot> for SnapshotDocument {
    fn from(snapshot: SchemaSnapshot) -> Self {
        let shape = vec![snapshot.row_count, snapshot.columns.len() as u64];
        let columns = snapshot
            .columns
            .into_iter()
            .map(|c| {
                (
                    c.name,
                    ColumnRecord {
                        dtype: c.type_tag,
                        null_count: c.null_count,
                        total_count: snapshot.row_count,
                    },
                )
            })
            .collect();

        Self { columns, shape }
    }
}

impl TryFrom<SnapshotDocument> for SchemaSnapshot {
    type Error = String;

    fn try_from(doc: SnapshotDocument) -> Result<Self, Self::Error> {
        // shape[0] is authoritative; older entries without a shape fall back to total_count
        let row_count = doc
            .shape
            .first()
            .copied()
            .or_else(|| doc.columns.first().map(|(_, c)| c.total_count))
            .unwrap_or(0);

        let columns = doc
            .columns
            .into_iter()
            .map(|(name, record)| ColumnDescriptor::new(name, &record.dtype, record.null_count))
            .collect();

        SchemaSnapshot::new(columns, row_count).map_err(|e| e.to_string())
    }
}

/// Serialize columns as a JSON object while keeping their order
mod ordered_columns {
    use super::*;

    pub fn serialize<S>(columns: &[(String, ColumnRecord)], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(columns.len()))?;
        for (name, record) in columns {
            map.serialize_entry(name, record)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<(String, ColumnRecord)>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ColumnsVisitor)
    }

    struct ColumnsVisitor;

    impl<'de> Visitor<'de> for ColumnsVisitor {
        type Value = Vec<(String, ColumnRecord)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of column name to column record")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut columns: Vec<(String, ColumnRecord)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, record)) = access.next_entry::<String, ColumnRecord>()? {
                if columns.iter().any(|(existing, _)| existing == &name) {
                    return Err(de::Error::custom(format!("duplicate column '{}'", name)));
                }
                columns.push((name, record));
            }
            Ok(columns)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriftError;
    use crate::table::JsonTable;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn users_snapshot() -> SchemaSnapshot {
        SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("user_id", "int64", 0),
                ColumnDescriptor::new("name", "string", 1),
            ],
            3,
        )
        .unwrap()
    }

    #[test]
    fn test_build_from_table() {
        let table = JsonTable::from_value(&json!([
            {"user_id": 1, "name": "Alice"},
            {"user_id": 2, "name": null},
            {"user_id": 3, "name": "Carol"}
        ]))
        .unwrap();

        let snapshot = SchemaSnapshot::build(&table).unwrap();
        assert_eq!(snapshot, users_snapshot());
        assert_eq!(snapshot.column_count(), 2);
        assert_eq!(snapshot.column("name").map(|c| c.null_count), Some(1));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("id", "int64", 0),
                ColumnDescriptor::new("id", "string", 0),
            ],
            1,
        );
        assert!(matches!(result, Err(DriftError::TableAccess(_))));
    }

    #[test]
    fn test_type_tags_are_normalized() {
        let column = ColumnDescriptor::new("ts", "  DateTime ", 0);
        assert_eq!(column.type_tag, "datetime");
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(users_snapshot()).unwrap();
        assert_eq!(
            value,
            json!({
                "columns": {
                    "user_id": {"dtype": "int64", "null_count": 0, "total_count": 3},
                    "name": {"dtype": "string", "null_count": 1, "total_count": 3}
                },
                "shape": [3, 2]
            })
        );
    }

    #[test]
    fn test_document_keeps_column_order() {
        let text = serde_json::to_string(&users_snapshot()).unwrap();
        assert!(text.find("user_id").unwrap() < text.find("name").unwrap());

        let parsed: SchemaSnapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, users_snapshot());
    }

    #[test]
    fn test_reads_document_without_shape() {
        let parsed: SchemaSnapshot = serde_json::from_value(json!({
            "columns": {"a": {"dtype": "int64", "null_count": 0, "total_count": 7}}
        }))
        .unwrap();
        assert_eq!(parsed.row_count(), 7);
    }

    #[test]
    fn test_fingerprint_ignores_order_and_counts() {
        let reordered = SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("name", "string", 40),
                ColumnDescriptor::new("user_id", "int64", 2),
            ],
            1_000,
        )
        .unwrap();
        assert_eq!(reordered.fingerprint(), users_snapshot().fingerprint());

        let retyped = SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("user_id", "string", 0),
                ColumnDescriptor::new("name", "string", 1),
            ],
            3,
        )
        .unwrap();
        assert_ne!(retyped.fingerprint(), users_snapshot().fingerprint());
    }

    #[test]
    fn test_fingerprint_separates_names_from_tags() {
        let left = SchemaSnapshot::new(vec![ColumnDescriptor::new("a:b", "c", 0)], 1).unwrap();
        let right = SchemaSnapshot::new(vec![ColumnDescriptor::new("a", "b:c", 0)], 1).unwrap();
        assert_ne!(left.fingerprint(), right.fingerprint());

        let joined = SchemaSnapshot::new(vec![ColumnDescriptor::new("a", "b\nc:d", 0)], 1).unwrap();
        let split = SchemaSnapshot::new(
            vec![ColumnDescriptor::new("a", "b", 0), ColumnDescriptor::new("c", "d", 0)],
            1,
        )
        .unwrap();
        assert_ne!(joined.fingerprint(), split.fingerprint());
    }

    #[test]
    fn test_equality_is_exact_but_drift_ignores_order() {
        let reordered = SchemaSnapshot::new(
            vec![
                ColumnDescriptor::new("name", "string", 1),
                ColumnDescriptor::new("user_id", "int64", 0),
            ],
            3,
        )
        .unwrap();
        assert_ne!(reordered, users_snapshot());
        assert_eq!(reordered.fingerprint(), users_snapshot().fingerprint());
    }
}
