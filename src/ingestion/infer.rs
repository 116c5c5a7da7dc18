//! Per-column type inference shared by CSV and Excel ingestion.
//!
//! Each column is typed from all of its non-missing cells, first match wins:
//!
//! 1. [`DataType::Int64`]: every value is an integer
//! 2. [`DataType::Float64`]: every value is numeric
//! 3. [`DataType::Bool`]: every value is a boolean (`True`/`TRUE`/`true`, `False`/`FALSE`/`false`)
//! 4. [`DataType::Utf8`]: anything else; numbers and booleans are rendered as text
//!
//! A column without any non-missing value is `Utf8` of all [`Value::Null`].

use std::collections::{HashMap, HashSet};

use crate::error::{IngestionError, IngestionResult};
use crate::types::{Column, DataType, Table, Value};

use super::unified::IngestionFormat;

/// Missing-value markers recognized by default (the pandas NA set).
pub const DEFAULT_MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// A cell before its column type is known.
///
/// CSV fields arrive as `Text`/`Missing`; the typed variants come from workbook cells.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(not(feature = "excel"), allow(dead_code))]
pub(crate) enum RawCell {
    Missing,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl RawCell {
    /// Classify text from a CSV field or a workbook string cell.
    pub(crate) fn from_text(raw: &str, missing_markers: &[String]) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || missing_markers.iter().any(|m| m == trimmed) {
            Self::Missing
        } else {
            Self::Text(trimmed.to_owned())
        }
    }

    fn as_int(&self) -> Option<Value> {
        match self {
            Self::Missing => Some(Value::Null),
            Self::Int(i) => Some(Value::Int64(*i)),
            Self::Float(f) => integral(*f).map(Value::Int64),
            Self::Bool(_) => None,
            Self::Text(s) => s.parse::<i64>().ok().map(Value::Int64),
        }
    }

    fn as_float(&self) -> Option<Value> {
        match self {
            Self::Missing => Some(Value::Null),
            Self::Int(i) => Some(Value::Float64(*i as f64)),
            Self::Float(f) => Some(Value::Float64(*f)),
            Self::Bool(_) => None,
            Self::Text(s) => s.parse::<f64>().ok().map(Value::Float64),
        }
    }

    fn as_bool(&self) -> Option<Value> {
        match self {
            Self::Missing => Some(Value::Null),
            Self::Bool(b) => Some(Value::Bool(*b)),
            Self::Text(s) => parse_bool(s).map(Value::Bool),
            Self::Int(_) | Self::Float(_) => None,
        }
    }

    fn into_text(self) -> Value {
        match self {
            Self::Missing => Value::Null,
            Self::Int(i) => Value::Utf8(i.to_string()),
            Self::Float(f) => Value::Utf8(f.to_string()),
            Self::Bool(b) => Value::Utf8(b.to_string()),
            Self::Text(s) => Value::Utf8(s),
        }
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

/// Infer a column's type and convert its cells.
pub(crate) fn infer_column(name: String, cells: Vec<RawCell>) -> Column {
    if cells.iter().all(|c| matches!(c, RawCell::Missing)) {
        let values = vec![Value::Null; cells.len()];
        return Column::new(name, DataType::Utf8, values);
    }

    let attempts: [(DataType, fn(&RawCell) -> Option<Value>); 3] = [
        (DataType::Int64, RawCell::as_int),
        (DataType::Float64, RawCell::as_float),
        (DataType::Bool, RawCell::as_bool),
    ];
    for (data_type, convert) in attempts {
        if let Some(values) = cells.iter().map(convert).collect::<Option<Vec<Value>>>() {
            return Column::new(name, data_type, values);
        }
    }

    let values = cells.into_iter().map(RawCell::into_text).collect();
    Column::new(name, DataType::Utf8, values)
}

/// Turn raw header cells into unique, non-empty column names.
///
/// Blank headers become `Unnamed: {index}`; repeats get `.1`, `.2`, ... suffixes.
pub(crate) fn unique_column_names<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out = Vec::new();
    let mut taken: HashSet<String> = HashSet::new();
    let mut repeats: HashMap<String, usize> = HashMap::new();

    for (idx, name) in raw.into_iter().enumerate() {
        let trimmed = name.trim();
        let base = if trimmed.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            trimmed.to_owned()
        };

        let mut candidate = base.clone();
        while taken.contains(&candidate) {
            let n = repeats.entry(base.clone()).or_insert(0);
            *n += 1;
            candidate = format!("{base}.{n}");
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Accumulates rows of [`RawCell`]s column-wise, then infers each column on [`Self::finish`].
pub(crate) struct TableBuilder {
    format: IngestionFormat,
    names: Vec<String>,
    columns: Vec<Vec<RawCell>>,
}

impl TableBuilder {
    pub(crate) fn new(format: IngestionFormat, names: Vec<String>) -> Self {
        let columns = names.iter().map(|_| Vec::new()).collect();
        Self {
            format,
            names,
            columns,
        }
    }

    pub(crate) fn width(&self) -> usize {
        self.names.len()
    }

    /// Append one row; short rows are padded with missing cells.
    ///
    /// Callers reject rows wider than [`Self::width`] before pushing.
    pub(crate) fn push_row(&mut self, cells: Vec<RawCell>) {
        let mut cells = cells.into_iter();
        for column in &mut self.columns {
            column.push(cells.next().unwrap_or(RawCell::Missing));
        }
    }

    pub(crate) fn finish(self) -> IngestionResult<Table> {
        let columns = self
            .names
            .into_iter()
            .zip(self.columns)
            .map(|(name, cells)| infer_column(name, cells))
            .collect();
        Table::new(columns).map_err(|e| IngestionError::malformed(self.format, e.to_string()))
    }
}
