//! CSV table adapter
//!
//! Reads the whole file once and keeps only the per-column facts.

use super::infer::{infer_text, ColumnInference, TypeTag};
use super::{find_column, ColumnStats, TableAdapter};
use crate::error::{table_error, DriftResult};
use csv::{ReaderBuilder, Trim};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CsvTable {
    columns: Vec<ColumnStats>,
    rows: u64,
}

impl CsvTable {
    pub fn from_path(path: impl AsRef<Path>) -> DriftResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| table_error(format!("opening {}: {}", path.display(), e)))?;
        let table = Self::from_reader(file)?;
        debug!(
            "Read CSV {}: {} rows, {} columns",
            path.display(),
            table.rows,
            table.columns.len()
        );
        Ok(table)
    }

    /// Parse CSV with a header row from any reader
    pub fn from_reader<R: Read>(reader: R) -> DriftResult<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| table_error(format!("reading CSV header: {}", e)))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut seen = HashSet::new();
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(table_error(format!("duplicate column name '{}'", name)));
            }
        }

        let mut inference = vec![ColumnInference::new(TypeTag::String); headers.len()];
        let mut rows = 0u64;

        for result in rdr.records() {
            let record = result.map_err(|e| table_error(format!("parsing CSV record: {}", e)))?;
            for (state, cell) in inference.iter_mut().zip(record.iter()) {
                state.observe(infer_text(cell));
            }
            rows += 1;
        }

        let columns = headers
            .into_iter()
            .zip(inference)
            .map(|(name, state)| {
                let (type_tag, null_count) = state.finish();
                ColumnStats {
                    name,
                    type_tag,
                    null_count,
                }
            })
            .collect();

        Ok(Self { columns, rows })
    }
}

impl TableAdapter for CsvTable {
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
