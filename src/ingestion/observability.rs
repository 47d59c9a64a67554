//! Reporting of ingestion outcomes.
//!
//! A successful load is described by [`IngestionStats`]: the row count plus a per-column profile
//! (resolved type, null count). Observers use it to flag columns a privacy rule should know
//! about before the dataset reaches a pipeline, such as personal-identifier columns or columns
//! that came back entirely empty.

use std::path::PathBuf;

use crate::error::IngestionError;
use crate::processing::PII_CANDIDATES;
use crate::types::{DataSet, DataType};

use super::unified::IngestionFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    Info,
    Warning,
    /// The source was readable but its content could not be loaded.
    Error,
    /// The source could not be read at all.
    Critical,
}

impl IngestionSeverity {
    /// Classify a failed load.
    pub fn classify(error: &IngestionError) -> Self {
        match error {
            IngestionError::Io(_) => Self::Critical,
            IngestionError::Csv(err) if matches!(err.kind(), ::csv::ErrorKind::Io(_)) => Self::Critical,
            IngestionError::Csv(_) | IngestionError::SchemaMismatch { .. } | IngestionError::ParseError { .. } => {
                Self::Error
            }
        }
    }
}

/// Where a load came from and how it was read.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    pub path: PathBuf,
    pub format: IngestionFormat,
    /// Column types were inferred rather than taken from a schema.
    pub inferred: bool,
}

/// Resolved type and null count of one loaded column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProfile {
    pub name: String,
    pub data_type: DataType,
    pub nulls: usize,
}

/// Shape of a successfully loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionStats {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
}

impl IngestionStats {
    /// Profile every column of `dataset`.
    pub fn profile(dataset: &DataSet) -> Self {
        let columns = dataset
            .schema
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| ColumnProfile {
                name: field.name.clone(),
                data_type: field.data_type,
                nulls: dataset.column(idx).filter(|v| v.is_null()).count(),
            })
            .collect();
        Self {
            rows: dataset.row_count(),
            columns,
        }
    }

    /// Columns whose name is one `dropPII: true` would remove.
    pub fn pii_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .filter(|name| PII_CANDIDATES.contains(name))
            .collect()
    }

    /// Columns with no value in any row. Always empty for a dataset without rows.
    pub fn empty_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| self.rows > 0 && c.nulls == self.rows)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Observer interface for ingestion outcomes.
pub trait IngestionObserver: Send + Sync {
    /// Called when ingestion succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: &IngestionStats) {}

    /// Called when ingestion fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when a failure meets the alert threshold. Forwards to [`Self::on_failure`] unless
    /// overridden.
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Forwards ingestion events to `tracing`.
///
/// Besides the outcome itself, a successful load warns about personal-identifier columns and
/// entirely empty columns, and logs each column profile at `debug`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: &IngestionStats) {
        tracing::info!(
            format = ?ctx.format,
            path = %ctx.path.display(),
            inferred = ctx.inferred,
            rows = stats.rows,
            columns = stats.columns.len(),
            "dataset ingested"
        );
        for column in &stats.columns {
            tracing::debug!(
                column = %column.name,
                data_type = ?column.data_type,
                nulls = column.nulls,
                "column profile"
            );
        }
        let pii = stats.pii_columns();
        if !pii.is_empty() {
            tracing::warn!(path = %ctx.path.display(), columns = ?pii, "personal-identifier columns loaded");
        }
        let empty = stats.empty_columns();
        if !empty.is_empty() {
            tracing::warn!(path = %ctx.path.display(), columns = ?empty, "columns without any value");
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::warn!(
            format = ?ctx.format,
            path = %ctx.path.display(),
            ?severity,
            %error,
            "dataset ingestion failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            format = ?ctx.format,
            path = %ctx.path.display(),
            ?severity,
            %error,
            "dataset ingestion alert"
        );
    }
}
