//! Table adapters
//!
//! The detector never reads data itself. Anything that can report its
//! column names, a type tag and a null count per column, and a row count
//! can be fingerprinted.

pub mod csv;
pub mod infer;
pub mod json;

pub use self::csv::CsvTable;
pub use self::json::JsonTable;
pub use infer::TypeTag;

use crate::error::DriftResult;

/// Structural facts about one table-like value
pub trait TableAdapter {
    /// Column names in the table's declared order
    fn column_names(&self) -> DriftResult<Vec<String>>;

    /// Type tag of `column`, before normalization
    fn type_tag(&self, column: &str) -> DriftResult<String>;

    fn null_count(&self, column: &str) -> DriftResult<u64>;

    fn row_count(&self) -> DriftResult<u64>;
}

impl<T: TableAdapter + ?Sized> TableAdapter for &T {
    fn column_names(&self) -> DriftResult<Vec<String>> {
        (**self).column_names()
    }

    fn type_tag(&self, column: &str) -> DriftResult<String> {
        (**self).type_tag(column)
    }

    fn null_count(&self, column: &str) -> DriftResult<u64> {
        (**self).null_count(column)
    }

    fn row_count(&self) -> DriftResult<u64> {
        (**self).row_count()
    }
}

/// Per-column facts gathered by the bundled adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnStats {
    pub name: String,
    pub type_tag: TypeTag,
    pub null_count: u64,
}

/// Shared lookup for adapters that precompute `ColumnStats`
pub(crate) fn find_column<'a>(columns: &'a [ColumnStats], name: &str) -> DriftResult<&'a ColumnStats> {
    columns
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| crate::error::table_error(format!("Column '{}' not found", name)))
}
