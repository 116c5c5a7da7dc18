//! Core data model produced by ingestion.
//!
//! An ingested upload becomes a [`Table`]: an ordered list of named, typed [`Column`]s that all
//! share one row count. Column types are inferred during ingestion, see
//! [`crate::ingestion::infer`].

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::error::TableError;

/// Logical type of a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl DataType {
    /// `true` for [`DataType::Int64`] and [`DataType::Float64`].
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Utf8 => "utf8",
        };
        f.write_str(s)
    }
}

/// A single typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value; integers are widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(i) => Some(*i as f64),
            Self::Float64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A named column of values sharing one [`DataType`].
///
/// Every non-null value matches `data_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Column name, unique within its [`Table`].
    pub name: String,
    /// Inferred column type.
    pub data_type: DataType,
    /// Cell values in row order.
    pub values: Vec<Value>,
}

impl Column {
    /// Create a new column.
    pub fn new(name: impl Into<String>, data_type: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of missing values.
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }
}

/// In-memory tabular data with named columns and a uniform row count.
///
/// Invariants (checked by [`Table::new`]):
///
/// - all columns have the same length
/// - column names are unique
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Create a table, validating the length and uniqueness invariants.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
                return Err(TableError::ColumnLengthMismatch {
                    column: bad.name.clone(),
                    expected,
                    actual: bad.len(),
                });
            }
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(columns.len());
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(TableError::DuplicateColumn(c.name.clone()));
            }
        }

        Ok(Self { columns })
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Consume the table, returning its columns.
    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    /// Number of rows (0 for a table without columns).
    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// `(rows, columns)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count(), self.column_count())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Returns the index of a column by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Values of row `idx` in column order, or `None` if out of range.
    pub fn row(&self, idx: usize) -> Option<Vec<&Value>> {
        if idx >= self.row_count() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[idx]).collect())
    }
}
