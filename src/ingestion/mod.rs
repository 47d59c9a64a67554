//! Ingestion entrypoints and implementations.
//!
//! Datasets reach the pipeline through this module. Most callers should use
//! [`ingest_from_path`] (from [`unified`]) which:
//!
//! - auto-detects format by file extension (or you can override via [`IngestionOptions`])
//! - parses against a schema, or infers column types when no schema is given
//! - optionally reports a per-column profile, or the classified failure, to an
//!   [`IngestionObserver`]
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - [`json`]

pub mod csv;
pub mod json;
pub mod observability;
pub mod unified;

pub use observability::{
    ColumnProfile, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats, TracingObserver,
};
pub use unified::{ingest_from_path, IngestionFormat, IngestionOptions};
