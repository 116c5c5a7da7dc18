//! Ingestion entrypoints and implementations.
//!
//! Most callers should use [`ingest`] (from [`unified`]) which:
//!
//! - resolves the format from the upload's file name extension (or [`IngestionOptions::format`])
//! - detects the text encoding of CSV uploads before decoding
//! - performs ingestion into an in-memory [`crate::types::Table`]
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - `excel` (cargo feature `excel`, on by default)
//! - [`encoding`] for detection on its own

pub mod csv;
pub mod encoding;
#[cfg(feature = "excel")]
pub mod excel;
pub mod infer;
pub mod observability;
pub mod unified;
pub mod upload;

pub use encoding::{EncodingGuess, TextEncoding, detect_encoding};
pub use infer::DEFAULT_MISSING_MARKERS;
pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, StdErrObserver,
    TracingObserver,
};
pub use unified::{
    ExcelSheetSelection, IngestionFormat, IngestionOptions, IngestionReport, ingest, ingest_with_defaults,
    ingest_with_report,
};
pub use upload::UploadedFile;
