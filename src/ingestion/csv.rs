//! CSV ingestion implementation.

use std::io::{Read, Seek};

use crate::error::{IngestionError, IngestionResult};
use crate::types::Table;

use super::encoding::{EncodingGuess, TextEncoding, detect_encoding, is_binary_control};
use super::infer::{RawCell, TableBuilder, unique_column_names};
use super::unified::{IngestionFormat, IngestionOptions};
use super::upload::{Rewind, read_bytes};

/// Ingest CSV from a seekable stream.
///
/// The stream is read twice: once (optionally bounded by
/// [`IngestionOptions::max_detection_bytes`]) for encoding detection, then in full for decoding.
/// It is rewound to the start after each pass, including when a pass fails.
///
/// Detection is skipped when [`IngestionOptions::encoding`] is set.
pub fn ingest_csv_from_reader<R: Read + Seek>(
    reader: &mut R,
    options: &IngestionOptions,
) -> IngestionResult<(Table, EncodingGuess)> {
    let guess = match options.encoding {
        Some(forced) => EncodingGuess::new(forced, 1.0),
        None => {
            let mut stream = Rewind::start(&mut *reader)?;
            let sample = read_bytes(&mut *stream, options.max_detection_bytes)?;
            stream.finish()?;
            detect_encoding(&sample)
        }
    };
    tracing::debug!(
        encoding = guess.label(),
        confidence = guess.confidence,
        "csv encoding selected"
    );

    let mut stream = Rewind::start(reader)?;
    let bytes = read_bytes(&mut *stream, None)?;
    stream.finish()?;

    let table = ingest_csv_from_bytes(&bytes, guess.encoding, options)?;
    Ok((table, guess))
}

/// Decode `bytes` with `encoding` and parse them as delimited text.
pub fn ingest_csv_from_bytes(
    bytes: &[u8],
    encoding: TextEncoding,
    options: &IngestionOptions,
) -> IngestionResult<Table> {
    let text = decode_text(bytes, encoding)?;
    ingest_csv_from_str(&text, options)
}

/// Parse already-decoded CSV text.
///
/// Rules:
///
/// - the first record is the header; blank and repeated names are made unique
/// - blank lines are skipped
/// - a row shorter than the header is padded with missing values; a longer row is an error
/// - empty or whitespace-only text yields [`Table::empty`]
pub fn ingest_csv_from_str(text: &str, options: &IngestionOptions) -> IngestionResult<Table> {
    if text.trim().is_empty() {
        return Ok(Table::empty());
    }

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(options.delimiter)
        .from_reader(text.as_bytes());

    let headers = rdr.headers().map_err(IngestionError::from_csv)?.clone();
    let names = unique_column_names(headers.iter().map(str::to_owned));
    let mut builder = TableBuilder::new(IngestionFormat::Csv, names);

    let mut padded_rows = 0usize;
    for result in rdr.records() {
        let record = result.map_err(IngestionError::from_csv)?;
        if record.len() > builder.width() {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(IngestionError::malformed(
                IngestionFormat::Csv,
                format!(
                    "expected {} fields in line {line}, saw {}",
                    builder.width(),
                    record.len()
                ),
            ));
        }
        if record.len() < builder.width() {
            padded_rows += 1;
        }

        let cells = record
            .iter()
            .map(|raw| RawCell::from_text(raw, &options.missing_markers))
            .collect();
        builder.push_row(cells);
    }

    if padded_rows > 0 {
        tracing::debug!(padded_rows, "short csv rows padded with missing values");
    }
    builder.finish()
}

/// Strictly decode `bytes`, rejecting binary-looking content.
fn decode_text(bytes: &[u8], encoding: TextEncoding) -> IngestionResult<String> {
    let text = encoding.decode(bytes).ok_or_else(|| {
        IngestionError::malformed(
            IngestionFormat::Csv,
            format!("bytes are not valid {}", encoding.label()),
        )
    })?;

    if let Some((offset, c)) = text.char_indices().find(|(_, c)| is_binary_control(*c)) {
        return Err(IngestionError::malformed(
            IngestionFormat::Csv,
            format!(
                "binary content: control character U+{:04X} at offset {offset}",
                c as u32
            ),
        ));
    }

    Ok(text.into_owned())
}
