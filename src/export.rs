//! Re-serialization of a [`Table`] for downstream collaborators.
//!
//! Rendering and HTML export stay with the host; this module only produces the two plain shapes
//! such tools consume: CSV text and an array of JSON row objects.

use std::io::Write;

use serde_json::{Map, Number};

use crate::error::ExportError;
use crate::types::{Table, Value};

impl Table {
    /// Write the table as CSV with a header row.
    ///
    /// Missing values are written as empty fields and booleans as `True`/`False`, so ingesting
    /// the output again yields the same column types.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut wtr = csv::Writer::from_writer(writer);
        if self.is_empty() {
            wtr.flush()?;
            return Ok(());
        }

        wtr.write_record(self.column_names())?;
        for idx in 0..self.row_count() {
            wtr.write_record(self.columns().iter().map(|c| csv_field(&c.values[idx])))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// [`Table::write_csv`] into a `String`.
    pub fn to_csv_string(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        // csv output of UTF-8 fields is UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Rows as JSON objects keyed by column name, in row order.
    ///
    /// Non-finite floats become `null`.
    pub fn to_json_records(&self) -> serde_json::Value {
        let rows = (0..self.row_count())
            .map(|idx| {
                let obj: Map<String, serde_json::Value> = self
                    .columns()
                    .iter()
                    .map(|c| (c.name.clone(), json_value(&c.values[idx])))
                    .collect();
                serde_json::Value::Object(obj)
            })
            .collect();
        serde_json::Value::Array(rows)
    }

    /// [`Table::to_json_records`] rendered as a JSON string.
    pub fn to_json_records_string(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string(&self.to_json_records())?)
    }
}

fn csv_field(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Int64(i) => i.to_string(),
        Value::Float64(f) => f.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Utf8(s) => s.clone(),
    }
}

fn json_value(v: &Value) -> serde_json::Value {
    match v {
        Value::Null => serde_json::Value::Null,
        Value::Int64(i) => serde_json::Value::Number((*i).into()),
        Value::Float64(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Utf8(s) => serde_json::Value::String(s.clone()),
    }
}
