//! In-memory dataset transformations.
//!
//! The processing layer operates on [`crate::types::DataSet`] values and never mutates its
//! input: every function returns a new dataset.
//!
//! - [`filter_with_specs`]: rule predicates (plus [`filter()`] for arbitrary closures)
//! - [`select_fields`]: column projection
//! - [`aggregate`]: time-bucket grouping and `{field}_{op}` reductions (built on [`reduce()`])
//! - [`obfuscate`]: dropPII, bucketing, rounding, jitter, dpNoise, kAnonymity
//! - [`generate_synthetic`]: resampled synthetic datasets
//!
//! Stages never fail. A spec that references a missing column, uses an unknown operator or
//! cannot be coerced is skipped; see [`crate::error::SkipReason`].
//!
//! ## Example: filter → select → aggregate
//!
//! ```rust
//! use consent_pipeline::processing::{aggregate, filter_with_specs, select_fields};
//! use consent_pipeline::rule::{AggregationSpec, FilterSpec};
//! use consent_pipeline::types::{DataSet, DataType, Field, Schema, Value};
//! use serde_json::json;
//!
//! let ds = DataSet::new(
//!     Schema::new(vec![
//!         Field::new("age", DataType::Number),
//!         Field::new("city", DataType::Text),
//!     ]),
//!     vec![
//!         vec![Value::Number(28.0), Value::text("Oslo")],
//!         vec![Value::Number(44.0), Value::text("Bergen")],
//!         vec![Value::Number(51.0), Value::text("Oslo")],
//!     ],
//! );
//!
//! let older = filter_with_specs(&ds, &[FilterSpec::new("age", "gt", json!(30))]);
//! let ages = select_fields(&older, Some(&["age".to_string()]));
//! let stats = aggregate(
//!     &ages,
//!     &[AggregationSpec { op: "avg".into(), field: Some("age".into()), ..Default::default() }],
//! );
//! assert_eq!(stats.rows, vec![vec![Value::Number(47.5)]]);
//! ```

use crate::error::SkipReason;

pub mod aggregate;
pub mod filter;
pub mod noise;
pub mod obfuscate;
pub mod reduce;
pub mod select;
pub mod synthetic;

pub use aggregate::{aggregate, TimeBucket};
pub use filter::{filter, filter_with_specs, FilterOp};
pub use obfuscate::{obfuscate, PII_CANDIDATES, SUPPRESSED};
pub use reduce::{reduce, reduce_values, ReduceOp};
pub use select::select_fields;
pub use synthetic::{generate_synthetic, SyntheticConfig};

/// Callback receiving the specs a stage skipped.
pub(crate) type SkipSink<'a> = &'a mut dyn FnMut(SkipReason);
