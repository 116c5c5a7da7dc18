//! `tabular-ingest` turns an uploaded CSV or Excel file into an in-memory [`types::Table`].
//!
//! The primary entrypoint is [`ingestion::ingest`], which picks the decoding strategy from the
//! upload's file name extension (or you can force a format via [`ingestion::IngestionOptions`]).
//!
//! ## What you can ingest
//!
//! **File formats (detected by extension, case-insensitive):**
//!
//! - **CSV**: `.csv`, decoded with a detected character encoding
//!   (UTF-8 with or without BOM, UTF-16LE/BE, windows-1252, ISO-8859-2, windows-1251)
//! - **Excel workbooks** (Cargo feature `excel`, on by default): `.xls`, `.xlsx`
//!
//! Any other extension fails with [`IngestionError::UnsupportedFormat`] before the stream is
//! read. Bytes that cannot be decoded fail with [`IngestionError::MalformedInput`].
//!
//! **Column types:**
//!
//! Column types are inferred per column from the non-missing cells:
//!
//! - [`types::DataType::Int64`]
//! - [`types::DataType::Float64`]
//! - [`types::DataType::Bool`]
//! - [`types::DataType::Utf8`]
//!
//! Empty cells and the usual NA markers (`NA`, `NULL`, `NaN`, ...) map to [`types::Value::Null`].
//!
//! ## Quick example
//!
//! ```rust
//! use tabular_ingest::ingestion::{ingest, IngestionOptions, UploadedFile};
//! use tabular_ingest::types::Value;
//!
//! # fn main() -> Result<(), tabular_ingest::IngestionError> {
//! let mut upload = UploadedFile::from_bytes("people.csv", "name,age\nAda,\n");
//! let table = ingest(&mut upload, &IngestionOptions::default())?;
//!
//! assert_eq!(table.row_count(), 1);
//! assert_eq!(table.column("age").unwrap().values, vec![Value::Null]);
//! # Ok(())
//! # }
//! ```
//!
//! Local files work the same way:
//!
//! ```no_run
//! use tabular_ingest::ingestion::{ingest_with_defaults, UploadedFile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut upload = UploadedFile::open("sales.xlsx")?;
//! let table = ingest_with_defaults(&mut upload)?;
//! println!("rows={} columns={}", table.row_count(), table.column_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: the ingest entrypoint, encoding detection and format-specific readers
//! - [`types`]: the in-memory table model
//! - [`cache`]: an optional, host-owned table cache keyed by content fingerprint
//! - [`export`]: CSV and JSON-records output for rendering/export collaborators
//! - [`error`]: error types

pub mod cache;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod types;

pub use error::{ExportError, IngestionError, IngestionErrorKind, IngestionResult, TableError};
