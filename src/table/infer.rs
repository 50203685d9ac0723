//! Scalar type inference shared by the bundled table adapters

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fmt;

/// Text cells read as missing values
const NULL_MARKERS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Type tags produced by the bundled adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Int64,
    Float64,
    Bool,
    Datetime,
    String,
    /// Mixed or nested values
    Object,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Int64 => "int64",
            TypeTag::Float64 => "float64",
            TypeTag::Bool => "bool",
            TypeTag::Datetime => "datetime",
            TypeTag::String => "string",
            TypeTag::Object => "object",
        }
    }

    /// Combine the tag seen so far with the tag of the next value.
    /// Integers widen to floats; any other disagreement collapses to `fallback`.
    pub fn widen(self, next: TypeTag, fallback: TypeTag) -> TypeTag {
        match (self, next) {
            (a, b) if a == b => a,
            (TypeTag::Int64, TypeTag::Float64) | (TypeTag::Float64, TypeTag::Int64) => TypeTag::Float64,
            _ => fallback,
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running inference state for one column
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnInference {
    seen: Option<TypeTag>,
    nulls: u64,
    fallback: TypeTag,
}

impl ColumnInference {
    pub fn new(fallback: TypeTag) -> Self {
        Self {
            seen: None,
            nulls: 0,
            fallback,
        }
    }

    pub fn observe(&mut self, tag: Option<TypeTag>) {
        match tag {
            None => self.nulls += 1,
            Some(tag) => {
                self.seen = Some(match self.seen {
                    None => tag,
                    Some(prev) => prev.widen(tag, self.fallback),
                });
            }
        }
    }

    /// Final tag and null count. A column with no non-null value gets the fallback tag.
    pub fn finish(self) -> (TypeTag, u64) {
        (self.seen.unwrap_or(self.fallback), self.nulls)
    }
}

/// Infer the tag of a text cell; `None` means the cell is null
pub fn infer_text(raw: &str) -> Option<TypeTag> {
    let v = raw.trim();
    if NULL_MARKERS.contains(&v) {
        return None;
    }

    if v.parse::<i64>().is_ok() {
        return Some(TypeTag::Int64);
    }
    if v.parse::<f64>().is_ok() {
        return Some(TypeTag::Float64);
    }
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("false") {
        return Some(TypeTag::Bool);
    }
    if is_datetime(v) {
        return Some(TypeTag::Datetime);
    }

    Some(TypeTag::String)
}

fn is_datetime(v: &str) -> bool {
    DateTime::parse_from_rfc3339(v).is_ok()
        || DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(v, fmt).is_ok())
        || NaiveDate::parse_from_str(v, "%Y-%m-%d").is_ok()
}
