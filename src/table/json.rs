//! JSON records adapter
//!
//! Accepts either a JSON array of objects or newline-delimited objects.
//! Column order follows first appearance; a key missing from a record
//! counts as a null in that record.

use super::infer::{ColumnInference, TypeTag};
use super::{find_column, ColumnStats, TableAdapter};
use crate::error::{table_error, DriftResult};
use chrono::DateTime;
use serde_json::{Map, Value};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct JsonTable {
    columns: Vec<ColumnStats>,
    rows: u64,
}

impl JsonTable {
    pub fn from_path(path: impl AsRef<Path>) -> DriftResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| table_error(format!("reading {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Parse a JSON array of objects, or NDJSON when the text is not an array
    pub fn parse(text: &str) -> DriftResult<Self> {
        let trimmed = text.trim_start();
        if trimmed.starts_with('[') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| table_error(format!("parsing JSON array: {}", e)))?;
            return Self::from_value(&value);
        }

        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .map_err(|e| table_error(format!("parsing NDJSON line {}: {}", idx + 1, e)))?;
            match value {
                Value::Object(record) => records.push(record),
                other => {
                    return Err(table_error(format!(
                        "NDJSON line {} is not an object: {}",
                        idx + 1,
                        other
                    )))
                }
            }
        }

        Ok(Self::from_records(&records))
    }

    pub fn from_value(value: &Value) -> DriftResult<Self> {
        let items = value
            .as_array()
            .ok_or_else(|| table_error("expected a JSON array of records"))?;

        let records = items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                item.as_object()
                    .cloned()
                    .ok_or_else(|| table_error(format!("record {} is not an object", idx)))
            })
            .collect::<DriftResult<Vec<_>>>()?;

        Ok(Self::from_records(&records))
    }

    pub fn from_records(records: &[Map<String, Value>]) -> Self {
        let mut names: Vec<&str> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !names.contains(&key.as_str()) {
                    names.push(key);
                }
            }
        }

        let columns = names
            .iter()
            .map(|name| {
                let mut state = ColumnInference::new(TypeTag::Object);
                for record in records {
                    state.observe(record.get(*name).and_then(infer_value));
                }
                let (type_tag, null_count) = state.finish();
                ColumnStats {
                    name: name.to_string(),
                    type_tag,
                    null_count,
                }
            })
            .collect();

        Self {
            columns,
            rows: records.len() as u64,
        }
    }
}

fn infer_value(value: &Value) -> Option<TypeTag> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(TypeTag::Bool),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(TypeTag::Int64),
        Value::Number(_) => Some(TypeTag::Float64),
        Value::String(s) if DateTime::parse_from_rfc3339(s).is_ok() => Some(TypeTag::Datetime),
        Value::String(_) => Some(TypeTag::String),
        Value::Array(_) | Value::Object(_) => Some(TypeTag::Object),
    }
}

impl TableAdapter for JsonTable {
    fn column_names(&self) -> DriftResult<Vec<String>> {
        Ok(self.columns.iter().map(|c| c.name.clone()).collect())
    }

    fn type_tag(&self, column: &str) -> DriftResult<String> {
        Ok(find_column(&self.columns, column)?.type_tag.to_string())
    }

    fn null_count(&self, column: &str) -> DriftResult<u64> {
        Ok(find_column(&self.columns, column)?.null_count)
    }

    fn row_count(&self) -> DriftResult<u64> {
        Ok(self.rows)
    }
}
