#![cfg(feature = "excel")]

use std::io::{Cursor, Read, Seek};

use calamine::{Data, Range, Reader, open_workbook_auto_from_rs};

use crate::error::{IngestionError, IngestionResult};
use crate::types::Table;

use super::infer::{RawCell, TableBuilder, unique_column_names};
use super::unified::{ExcelSheetSelection, IngestionFormat};
use super::upload::{Rewind, read_bytes};

/// Ingest a workbook (`.xlsx`, `.xls`) from a seekable stream into an in-memory [`Table`].
///
/// Behavior:
/// - The workbook kind is sniffed from content, so a mislabeled extension still opens
/// - Picks the sheet named by `selection`; otherwise uses the first sheet in the workbook
/// - The first row of the sheet's used range is the header row
/// - Remaining rows are typed per column, like CSV
///
/// The stream is rewound to the start before returning.
pub fn ingest_excel_from_reader<R: Read + Seek>(
    reader: &mut R,
    selection: &ExcelSheetSelection,
    missing_markers: &[String],
) -> IngestionResult<Table> {
    let mut stream = Rewind::start(reader)?;
    let bytes = read_bytes(&mut *stream, None)?;
    stream.finish()?;
    ingest_excel_from_bytes(bytes, selection, missing_markers)
}

/// Ingest a workbook already held in memory.
pub fn ingest_excel_from_bytes(
    bytes: Vec<u8>,
    selection: &ExcelSheetSelection,
    missing_markers: &[String],
) -> IngestionResult<Table> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(IngestionError::from_calamine)?;

    let sheets = workbook.sheet_names();
    let sheet = match selection {
        ExcelSheetSelection::First => sheets.first().cloned().ok_or_else(|| {
            IngestionError::malformed(IngestionFormat::Excel, "workbook has no sheets")
        })?,
        ExcelSheetSelection::Sheet(name) => {
            if !sheets.iter().any(|s| s == name) {
                return Err(IngestionError::malformed(
                    IngestionFormat::Excel,
                    format!("sheet '{name}' not found. sheets={sheets:?}"),
                ));
            }
            name.clone()
        }
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(IngestionError::from_calamine)?;
    tracing::debug!(sheet = %sheet, rows = range.height(), columns = range.width(), "reading sheet");
    ingest_sheet_range(&range, missing_markers)
}

fn ingest_sheet_range(range: &Range<Data>, missing_markers: &[String]) -> IngestionResult<Table> {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Table::empty());
    };

    let names = unique_column_names(header_row.iter().map(cell_to_header_string));
    let mut builder = TableBuilder::new(IngestionFormat::Excel, names);
    for row in rows {
        let cells = row.iter().map(|c| convert_cell(c, missing_markers)).collect();
        builder.push_row(cells);
    }
    builder.finish()
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
        Data::Empty => "".to_string(),
    }
}

fn convert_cell(c: &Data, missing_markers: &[String]) -> RawCell {
    match c {
        Data::Empty => RawCell::Missing,
        Data::Int(i) => RawCell::Int(*i),
        Data::Float(f) => RawCell::Float(*f),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            RawCell::from_text(s, missing_markers)
        }
        Data::DateTime(d) => RawCell::Text(d.to_string()),
        // Error cells render as `#DIV/0!`, `#N/A`, ...; the latter is a missing marker by default.
        Data::Error(e) => RawCell::from_text(&e.to_string(), missing_markers),
    }
}
