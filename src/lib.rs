//! `consent-pipeline` applies declarative privacy rules to in-memory tabular datasets.
//!
//! A [`rule::Rule`] describes one consent-scoped view of a [`types::DataSet`]: which rows to
//! keep, which columns to expose, how to aggregate, and how to obfuscate what remains. The
//! primary entrypoint is [`pipeline::Pipeline::run`] (or the free function [`run`]), which
//! composes four stages in a fixed order:
//!
//! ```text
//! filter → select → aggregate → obfuscate
//! ```
//!
//! ## What a rule can do
//!
//! - **filters**: `eq`, `ne`, `gt`, `lt`, `ge`, `le`, `in`, `between`, `contains`, `rangeDate`
//! - **fields**: column projection
//! - **aggregations**: `groupByDay` / `groupByMonth` keys plus `sum`, `avg`, `min`, `max`, `count`
//! - **obfuscation**: `dropPII`, `bucketing`, `rounding`, `jitter`, `dpNoise`, `kAnonymity`
//!
//! Stages never fail on a bad rule. Specs referencing unknown columns or operators, or values
//! that cannot be coerced, are skipped and reported as a [`SkipReason`] through `tracing` and an
//! optional [`pipeline::PipelineObserver`].
//!
//! ## Quick example
//!
//! ```rust
//! use consent_pipeline::rule::Rule;
//! use consent_pipeline::types::{DataSet, DataType, Field, Schema, Value};
//!
//! # fn main() -> Result<(), consent_pipeline::RuleError> {
//! let ds = DataSet::new(
//!     Schema::new(vec![
//!         Field::new("age", DataType::Number),
//!         Field::new("amount", DataType::Number),
//!     ]),
//!     vec![
//!         vec![Value::Number(23.0), Value::Number(12.4)],
//!         vec![Value::Number(67.0), Value::Number(8.6)],
//!     ],
//! );
//! let rule = Rule::from_json(
//!     r#"{
//!         "filters": [{"field": "age", "op": "gt", "value": 30}],
//!         "obfuscation": {"rounding": {"nearest": 5, "fields": ["amount"]}}
//!     }"#,
//! )?;
//! let out = consent_pipeline::run(&ds, &rule);
//! assert_eq!(out.rows, vec![vec![Value::Number(67.0), Value::Number(10.0)]]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Getting data in and out
//!
//! ```no_run
//! use consent_pipeline::export::to_csv_string;
//! use consent_pipeline::ingestion::{ingest_from_path, IngestionOptions};
//! use consent_pipeline::rule::Rule;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Column types are inferred when no schema is given.
//! let ds = ingest_from_path("transactions.csv", None, &IngestionOptions::default())?;
//! let rule = Rule::from_json(r#"{"obfuscation": {"dropPII": true}}"#)?;
//! let out = consent_pipeline::run(&ds, &rule);
//! print!("{}", to_csv_string(&out)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: schema, cells and the in-memory dataset
//! - [`rule`]: serde model of rule documents
//! - [`processing`]: the individual stages plus the synthetic generator
//! - [`pipeline`]: stage orchestration, observers and previews
//! - [`ingestion`]: CSV/JSON loaders with optional type inference
//! - [`export`]: CSV and JSON-record writers
//! - [`execution`]: parallel batches of pipeline jobs with throttling and metrics
//! - [`error`]: error types

pub mod error;
pub mod execution;
pub mod export;
pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod rule;
pub mod types;

pub use error::{
    CoercionError, ExecutionError, ExportError, ExportResult, IngestionError, IngestionResult, RuleError,
    SkipReason,
};
pub use pipeline::{run, Pipeline, PipelineOptions};
pub use rule::Rule;
