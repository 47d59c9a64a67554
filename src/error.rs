use thiserror::Error;

use crate::types::Value;

/// Convenience result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Convenience result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Error type returned by ingestion functions.
///
/// This is a single error enum shared across CSV and JSON ingestion.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV ingestion error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The input does not conform to the provided schema (missing required fields/columns, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A value could not be parsed into the required [`crate::types::DataType`].
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },
}

/// Error type returned when serializing a [`crate::types::DataSet`].
#[derive(Debug, Error)]
pub enum ExportError {
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error returned when an [`crate::execution::ExecutionEngine`] cannot be built.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// An option is out of range (e.g. `num_threads == Some(0)`).
    #[error("invalid execution options: {message}")]
    InvalidOptions { message: String },

    /// The worker pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A rule document that is not valid JSON, or whose shape cannot hold a rule at all
/// (e.g. `filters` is a string).
///
/// Unknown keys and unknown operators are not errors; the pipeline skips them at run time.
#[derive(Debug, Error)]
#[error("invalid rule document: {0}")]
pub struct RuleError(#[from] pub serde_json::Error);

/// A cell that could not be converted to the type an operation needs.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot coerce {found} to {expected}")]
pub struct CoercionError {
    /// Rendering of the offending cell.
    pub found: String,
    /// Target type name.
    pub expected: &'static str,
}

impl CoercionError {
    pub(crate) fn new(value: &Value, expected: &'static str) -> Self {
        let found = match value {
            Value::Null => "null".to_string(),
            Value::Number(v) => format!("number {v}"),
            Value::Text(s) => format!("text '{s}'"),
            Value::Timestamp(ts) => format!("timestamp {ts}"),
        };
        Self { found, expected }
    }
}

/// Why a pipeline stage ignored part of a rule.
///
/// These are soft failures: the offending spec is treated as a no-op and the stage carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// The spec references a column absent from the table.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },
    /// The spec's `op` is not recognized by the stage.
    #[error("unsupported operator '{op}'")]
    UnsupportedOperator { op: String },
    /// A bound, parameter or column could not be converted for the operation.
    #[error("type coercion failure on '{field}': {message}")]
    TypeCoercionFailure { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::SkipReason;

    #[test]
    fn skip_reasons_render_the_offending_part() {
        let unknown = SkipReason::UnknownField { field: "zip".into() };
        assert_eq!(unknown.to_string(), "unknown field 'zip'");
        let op = SkipReason::UnsupportedOperator { op: "median".into() };
        assert_eq!(op.to_string(), "unsupported operator 'median'");
        let coercion = SkipReason::TypeCoercionFailure {
            field: "age".into(),
            message: "cannot coerce text 'old' to number".into(),
        };
        assert_eq!(
            coercion.to_string(),
            "type coercion failure on 'age': cannot coerce text 'old' to number"
        );
        let _: &dyn std::error::Error = &coercion;
    }
}
