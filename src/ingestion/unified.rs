//! Unified ingestion entrypoint.
//!
//! Most callers should use [`ingest_from_path`], which loads a file into an in-memory
//! [`crate::types::DataSet`], either against a provided [`crate::types::Schema`] or with column
//! types inferred from the data.
//!
//! - If [`IngestionOptions::format`] is `None`, the ingestion format is inferred from the file
//!   extension.
//! - If an [`super::observability::IngestionObserver`] is provided, it receives the column
//!   profile of each load, or the classified failure.

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{DataSet, Schema};

use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};
use super::{csv, json};

/// Supported ingestion formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionFormat {
    /// Comma-separated values.
    Csv,
    /// JSON array-of-objects or NDJSON.
    Json,
}

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" | "ndjson" => Some(Self::Json),
            _ => None,
        }
    }

    /// Pick the format for `path` from its extension.
    pub fn detect(path: &Path) -> IngestionResult<Self> {
        let ext = path.extension().and_then(OsStr::to_str).unwrap_or_default();
        Self::from_extension(ext).ok_or_else(|| IngestionError::SchemaMismatch {
            message: format!("no ingestion format for extension '{ext}' ({})", path.display()),
        })
    }

    fn load(self, path: &Path, schema: Option<&Schema>) -> IngestionResult<DataSet> {
        match (self, schema) {
            (Self::Csv, Some(schema)) => csv::ingest_csv_from_path(path, schema),
            (Self::Csv, None) => csv::infer_csv_from_path(path),
            (Self::Json, Some(schema)) => json::ingest_json_from_path(path, schema),
            (Self::Json, None) => json::infer_json_from_path(path),
        }
    }
}

/// Options controlling unified ingestion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// If `None`, auto-detect format from file extension.
    pub format: Option<IngestionFormat>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Load `path` into a [`DataSet`].
///
/// The format comes from `options.format`, or from the file extension when unset. Without a
/// `schema`, column types are inferred from the data (see [`csv::infer_csv_from_reader`] and
/// [`json::infer_json_from_str`]).
///
/// A configured observer receives the column profile of a successful load, or the failure with
/// its [`IngestionSeverity`]; failures at or above `options.alert_at_or_above` are also raised
/// through `on_alert`. An unrecognized extension fails before anything is read and is not
/// reported.
///
/// ```no_run
/// use consent_pipeline::ingestion::{ingest_from_path, IngestionOptions};
///
/// # fn main() -> Result<(), consent_pipeline::IngestionError> {
/// let ds = ingest_from_path("transactions.csv", None, &IngestionOptions::default())?;
/// println!("rows={}", ds.row_count());
/// # Ok(())
/// # }
/// ```
pub fn ingest_from_path(
    path: impl AsRef<Path>,
    schema: Option<&Schema>,
    options: &IngestionOptions,
) -> IngestionResult<DataSet> {
    let path = path.as_ref();
    let format = match options.format {
        Some(format) => format,
        None => IngestionFormat::detect(path)?,
    };
    tracing::debug!(?format, path = %path.display(), inferred = schema.is_none(), "loading dataset");

    let result = format.load(path, schema);
    if let Some(observer) = options.observer.as_deref() {
        let ctx = IngestionContext {
            path: path.to_path_buf(),
            format,
            inferred: schema.is_none(),
        };
        report(observer, &ctx, &result, options.alert_at_or_above);
    }
    result
}

fn report(
    observer: &dyn IngestionObserver,
    ctx: &IngestionContext,
    result: &IngestionResult<DataSet>,
    alert_at_or_above: IngestionSeverity,
) {
    match result {
        Ok(dataset) => observer.on_success(ctx, &IngestionStats::profile(dataset)),
        Err(error) => {
            let severity = IngestionSeverity::classify(error);
            observer.on_failure(ctx, severity, error);
            if severity >= alert_at_or_above {
                observer.on_alert(ctx, severity, error);
            }
        }
    }
}
