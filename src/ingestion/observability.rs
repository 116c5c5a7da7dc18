//! Hooks for reporting how each upload went.

use std::fmt;
use std::sync::Arc;

use crate::error::IngestionError;

use super::encoding::EncodingGuess;
use super::unified::IngestionFormat;

/// How bad a failed upload is; ordered so hosts can pick an alert threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Not used for failures today; available to custom observers.
    Info,
    /// Warning-level event (the upload was rejected up front, e.g. unsupported extension).
    Warning,
    /// Error-level event (the upload could not be decoded).
    Error,
    /// Critical error (the upload stream itself failed).
    Critical,
}

/// What is known about the upload when an observer is called.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// Upload name as supplied by the host.
    pub file_name: String,
    /// Resolved format; `None` when the name did not map to one.
    pub format: Option<IngestionFormat>,
    /// Encoding used for a successful CSV ingestion.
    pub encoding: Option<EncodingGuess>,
}

/// Shape of a successfully ingested table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Data rows (header excluded).
    pub rows: usize,
    /// Number of ingested columns.
    pub columns: usize,
}

/// Receives the outcome of every [`super::ingest`] call that has it configured.
///
/// All methods default to no-ops.
pub trait IngestionObserver: Send + Sync {
    /// The upload produced a table.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// The upload was rejected or could not be decoded.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// A failure at or above [`super::IngestionOptions::alert_at_or_above`], delivered after
    /// [`Self::on_failure`]. Forwards to `on_failure` unless overridden.
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Forwards every callback to each inner observer, in order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }

    /// Add another observer to the end of the fan-out list.
    pub fn push(&mut self, observer: Arc<dyn IngestionObserver>) {
        self.observers.push(observer);
    }

    fn each(&self, f: impl Fn(&dyn IngestionObserver)) {
        self.observers.iter().for_each(|o| f(o.as_ref()));
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.each(|o| o.on_success(ctx, stats));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.each(|o| o.on_failure(ctx, severity, error));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.each(|o| o.on_alert(ctx, severity, error));
    }
}

fn format_label(ctx: &IngestionContext) -> String {
    ctx.format
        .map(|f| f.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Prints one line per upload to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl IngestionObserver for StdErrObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        let encoding = ctx.encoding.map(|g| g.label()).unwrap_or("-");
        eprintln!(
            "[ingest][ok] format={} file={} encoding={} rows={} columns={}",
            format_label(ctx),
            ctx.file_name,
            encoding,
            stats.rows,
            stats.columns
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        eprintln!(
            "[ingest][{:?}] format={} file={} err={}",
            severity,
            format_label(ctx),
            ctx.file_name,
            error
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        eprintln!(
            "[ALERT][ingest][{:?}] format={} file={} err={}",
            severity,
            format_label(ctx),
            ctx.file_name,
            error
        );
    }
}

/// Emits ingestion events through `tracing`, for hosts that already install a subscriber.
///
/// Successes log at `info`, failures at `warn` (or `error` for [`IngestionSeverity::Critical`]).
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            file = %ctx.file_name,
            format = %format_label(ctx),
            encoding = ctx.encoding.map(|g| g.label()),
            rows = stats.rows,
            columns = stats.columns,
            "upload ingested"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        if severity == IngestionSeverity::Critical {
            tracing::error!(file = %ctx.file_name, format = %format_label(ctx), ?severity, %error, "upload ingestion failed");
        } else {
            tracing::warn!(file = %ctx.file_name, format = %format_label(ctx), ?severity, %error, "upload ingestion failed");
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            alert = true,
            file = %ctx.file_name,
            format = %format_label(ctx),
            ?severity,
            %error,
            "upload ingestion alert"
        );
    }
}
