//! Unified ingestion entrypoint.
//!
//! Most callers should use [`ingest`], which turns an [`UploadedFile`] into an in-memory
//! [`crate::types::Table`].
//!
//! - If [`IngestionOptions::format`] is `None`, the format is inferred from the file name
//!   extension (`.csv`, `.xls`, `.xlsx`, case-insensitive). Anything else is rejected before a
//!   single byte is read.
//! - If an [`super::observability::IngestionObserver`] is provided, success/failure/alerts are
//!   reported to it.

use std::fmt;
use std::io::{Read, Seek};
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::Table;

use super::csv;
use super::encoding::{EncodingGuess, TextEncoding};
use super::infer::DEFAULT_MISSING_MARKERS;
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};
use super::upload::UploadedFile;

/// Supported ingestion formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestionFormat {
    /// Delimited text, decoded with a detected (or forced) encoding.
    Csv,
    /// `.xls` / `.xlsx` workbooks (feature-gated behind `excel`).
    Excel,
}

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xls" | "xlsx" => Some(Self::Excel),
            _ => None,
        }
    }
}

impl fmt::Display for IngestionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv => f.write_str("CSV"),
            Self::Excel => f.write_str("Excel"),
        }
    }
}

/// How to choose the sheet when ingesting a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExcelSheetSelection {
    /// Ingest the first sheet (default).
    #[default]
    First,
    /// Ingest a single named sheet.
    Sheet(String),
}

/// Options controlling ingestion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// If `None`, infer the format from the file name extension.
    pub format: Option<IngestionFormat>,
    /// CSV only: skip detection and decode with this encoding.
    pub encoding: Option<TextEncoding>,
    /// CSV only: bytes sampled for encoding detection. `None` samples the whole stream.
    pub max_detection_bytes: Option<usize>,
    /// CSV field delimiter.
    pub delimiter: u8,
    /// Cell texts treated as missing (compared after trimming).
    pub missing_markers: Vec<String>,
    /// Excel-specific options.
    pub excel_sheet_selection: ExcelSheetSelection,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("encoding", &self.encoding)
            .field("max_detection_bytes", &self.max_detection_bytes)
            .field("delimiter", &(self.delimiter as char))
            .field("missing_markers", &self.missing_markers.len())
            .field("excel_sheet_selection", &self.excel_sheet_selection)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            encoding: None,
            max_detection_bytes: None,
            delimiter: b',',
            missing_markers: DEFAULT_MISSING_MARKERS.iter().map(|s| s.to_string()).collect(),
            excel_sheet_selection: ExcelSheetSelection::default(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// A successful ingestion plus how it was decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionReport {
    pub table: Table,
    pub format: IngestionFormat,
    /// Encoding used to decode a CSV upload; `None` for workbooks.
    pub encoding: Option<EncodingGuess>,
}

/// Ingest an upload into a [`Table`].
///
/// - `.csv`: the stream is sampled for encoding detection, rewound, then decoded in full
/// - `.xls` / `.xlsx`: the first sheet (or [`IngestionOptions::excel_sheet_selection`]) is read,
///   first row as headers
///
/// The stream is rewound to the start before this returns, on success and on failure.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` on success, with row/column stats
/// - `on_failure` on failure, with a computed severity
/// - `on_alert` on failure when the computed severity is >= `options.alert_at_or_above`
///
/// # Examples
///
/// ```rust
/// use tabular_ingest::ingestion::{ingest, IngestionOptions, UploadedFile};
/// use tabular_ingest::types::{DataType, Value};
///
/// # fn main() -> Result<(), tabular_ingest::IngestionError> {
/// let mut file = UploadedFile::from_bytes("data.csv", "a,b\n1,2\n3,4\n");
/// let table = ingest(&mut file, &IngestionOptions::default())?;
///
/// assert_eq!(table.shape(), (2, 2));
/// let a = table.column("a").unwrap();
/// assert_eq!(a.data_type, DataType::Int64);
/// assert_eq!(a.values, vec![Value::Int64(1), Value::Int64(3)]);
/// # Ok(())
/// # }
/// ```
///
/// ## Observability (stderr logging + alert threshold)
///
/// ```rust
/// use std::sync::Arc;
///
/// use tabular_ingest::ingestion::{
///     ingest, IngestionOptions, IngestionSeverity, StdErrObserver, UploadedFile,
/// };
///
/// let opts = IngestionOptions {
///     observer: Some(Arc::new(StdErrObserver::default())),
///     alert_at_or_above: IngestionSeverity::Warning,
///     ..Default::default()
/// };
///
/// // Unsupported extensions are Warning-level and trigger `on_alert` at this threshold.
/// let mut file = UploadedFile::from_bytes("notes.txt", "hello");
/// let _err = ingest(&mut file, &opts).unwrap_err();
/// ```
pub fn ingest<R: Read + Seek>(
    file: &mut UploadedFile<R>,
    options: &IngestionOptions,
) -> IngestionResult<Table> {
    ingest_with_report(file, options).map(|r| r.table)
}

/// [`ingest`] with [`IngestionOptions::default`].
pub fn ingest_with_defaults<R: Read + Seek>(file: &mut UploadedFile<R>) -> IngestionResult<Table> {
    ingest(file, &IngestionOptions::default())
}

/// Like [`ingest`], but also returns the resolved format and the CSV encoding guess.
pub fn ingest_with_report<R: Read + Seek>(
    file: &mut UploadedFile<R>,
    options: &IngestionOptions,
) -> IngestionResult<IngestionReport> {
    let resolved = resolve_format(file, options);
    let mut ctx = IngestionContext {
        file_name: file.name().to_owned(),
        format: resolved.as_ref().ok().copied(),
        encoding: None,
    };
    tracing::debug!(file = %ctx.file_name, format = ?ctx.format, "ingesting upload");

    let result = resolved.and_then(|format| match format {
        IngestionFormat::Csv => {
            csv::ingest_csv_from_reader(file.get_mut(), options).map(|(table, guess)| IngestionReport {
                table,
                format,
                encoding: Some(guess),
            })
        }
        IngestionFormat::Excel => ingest_excel_dispatch(file, options).map(|table| IngestionReport {
            table,
            format,
            encoding: None,
        }),
    });

    if let Ok(report) = &result {
        ctx.encoding = report.encoding;
    }
    if let Some(obs) = options.observer.as_ref() {
        match &result {
            Ok(report) => obs.on_success(
                &ctx,
                IngestionStats {
                    rows: report.table.row_count(),
                    columns: report.table.column_count(),
                },
            ),
            Err(e) => {
                let sev = severity_for_error(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

pub(crate) fn severity_for_error(e: &IngestionError) -> IngestionSeverity {
    match e {
        IngestionError::Io(_) => IngestionSeverity::Critical,
        IngestionError::MalformedInput { .. } => IngestionSeverity::Error,
        IngestionError::UnsupportedFormat { .. } => IngestionSeverity::Warning,
    }
}

fn resolve_format<R: Read + Seek>(
    file: &UploadedFile<R>,
    options: &IngestionOptions,
) -> IngestionResult<IngestionFormat> {
    if let Some(f) = options.format {
        return Ok(f);
    }

    let ext = file.extension();
    let Some(ext_str) = ext.as_deref() else {
        return Err(IngestionError::UnsupportedFormat {
            file_name: file.name().to_owned(),
            extension: None,
            reason: "file name has no extension (expected .csv, .xls or .xlsx)".to_string(),
        });
    };

    IngestionFormat::from_extension(ext_str).ok_or_else(|| IngestionError::UnsupportedFormat {
        file_name: file.name().to_owned(),
        extension: ext.clone(),
        reason: format!("extension '.{ext_str}' is not one of .csv, .xls, .xlsx"),
    })
}

fn ingest_excel_dispatch<R: Read + Seek>(
    file: &mut UploadedFile<R>,
    options: &IngestionOptions,
) -> IngestionResult<Table> {
    #[cfg(feature = "excel")]
    {
        super::excel::ingest_excel_from_reader(
            file.get_mut(),
            &options.excel_sheet_selection,
            &options.missing_markers,
        )
    }

    #[cfg(not(feature = "excel"))]
    {
        let _ = options;
        Err(IngestionError::UnsupportedFormat {
            file_name: file.name().to_owned(),
            extension: file.extension(),
            reason: "excel ingestion not enabled (enable cargo feature 'excel')".to_string(),
        })
    }
}
