//! Rule orchestration.
//!
//! [`Pipeline::run`] composes the stages in a fixed order:
//!
//! ```text
//! DataSet × Rule → filter → select → aggregate → obfuscate → DataSet'
//! ```
//!
//! Each stage is the identity when its rule section is absent. The input dataset and rule are
//! never mutated and a new dataset is returned even when every stage is a no-op. A `Pipeline` has
//! no interior state besides its options, so one instance can serve concurrent callers.
//!
//! ```rust
//! use consent_pipeline::pipeline::{Pipeline, PipelineOptions};
//! use consent_pipeline::rule::Rule;
//! use consent_pipeline::types::{DataSet, DataType, Field, Schema, Value};
//!
//! # fn main() -> Result<(), consent_pipeline::RuleError> {
//! let ds = DataSet::new(
//!     Schema::new(vec![
//!         Field::new("email", DataType::Text),
//!         Field::new("amount", DataType::Number),
//!     ]),
//!     vec![vec![Value::text("a@example.com"), Value::Number(12.0)]],
//! );
//! let rule = Rule::from_json(r#"{"obfuscation": {"dropPII": true}}"#)?;
//!
//! let pipeline = Pipeline::new(PipelineOptions { seed: Some(7), ..Default::default() });
//! let out = pipeline.run(&ds, &rule);
//! assert_eq!(out.column_names(), vec!["amount"]);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::SkipReason;
use crate::export::to_json_records;
use crate::processing::aggregate::aggregate_observed;
use crate::processing::filter::filter_with_specs_observed;
use crate::processing::noise::{entropy_rng, seeded_rng};
use crate::processing::obfuscate::obfuscate_observed;
use crate::processing::select::select_fields_observed;
use crate::rule::Rule;
use crate::types::DataSet;

/// Default number of rows returned by [`Pipeline::preview`].
pub const DEFAULT_PREVIEW_ROWS: usize = 50;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Filter,
    Select,
    Aggregate,
    Obfuscate,
}

/// Observer interface for pipeline runs.
///
/// Implementors can record metrics or logs. Callbacks run synchronously on the calling thread.
pub trait PipelineObserver: Send + Sync {
    /// Called after a stage ran (not for stages whose rule section is absent).
    fn on_stage(&self, _stage: Stage, _rows_in: usize, _rows_out: usize) {}

    /// Called for every rule spec a stage ignored.
    fn on_skip(&self, _stage: Stage, _reason: &SkipReason) {}
}

/// Logs pipeline events to stderr.
#[derive(Debug, Default)]
pub struct StdErrPipelineObserver;

impl PipelineObserver for StdErrPipelineObserver {
    fn on_stage(&self, stage: Stage, rows_in: usize, rows_out: usize) {
        eprintln!("[pipeline][{stage:?}] rows_in={rows_in} rows_out={rows_out}");
    }

    fn on_skip(&self, stage: Stage, reason: &SkipReason) {
        eprintln!("[pipeline][{stage:?}][skip] {reason}");
    }
}

/// Options controlling a [`Pipeline`].
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct PipelineOptions {
    /// Seed for jitter/dpNoise draws. `None` seeds every run from OS entropy.
    pub seed: Option<u64>,
    /// Row limit applied by [`Pipeline::preview`].
    pub preview_rows: usize,
    /// Optional observer for stage and skip events.
    pub observer: Option<Arc<dyn PipelineObserver>>,
}

impl fmt::Debug for PipelineOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineOptions")
            .field("seed", &self.seed)
            .field("preview_rows", &self.preview_rows)
            .field("observer_set", &self.observer.is_some())
            .finish()
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            seed: None,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            observer: None,
        }
    }
}

/// A bounded, serializable view of a pipeline result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    /// Output column names.
    pub columns: Vec<String>,
    /// At most `preview_rows` records keyed by column name.
    pub rows: Vec<Map<String, JsonValue>>,
    /// Row count before truncation.
    pub total_rows: usize,
}

/// Stateless rule executor.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    /// Create a pipeline with the given options.
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run `rule` over `dataset`, drawing noise from a generator derived from the options.
    pub fn run(&self, dataset: &DataSet, rule: &Rule) -> DataSet {
        match self.options.seed {
            Some(seed) => self.run_with_rng(dataset, rule, &mut seeded_rng(seed)),
            None => self.run_with_rng(dataset, rule, &mut entropy_rng()),
        }
    }

    /// Run `rule` over `dataset` with an explicit random source.
    pub fn run_with_rng<R: Rng + ?Sized>(&self, dataset: &DataSet, rule: &Rule, rng: &mut R) -> DataSet {
        let mut out = dataset.clone();

        if let Some(filters) = rule.filters.as_deref().filter(|f| !f.is_empty()) {
            out = self.stage(Stage::Filter, &out, |ds, sink| {
                filter_with_specs_observed(ds, filters, sink)
            });
        }
        if let Some(fields) = rule.fields.as_deref().filter(|f| !f.is_empty()) {
            out = self.stage(Stage::Select, &out, |ds, sink| {
                select_fields_observed(ds, Some(fields), sink)
            });
        }
        if let Some(specs) = rule.aggregations.as_deref().filter(|a| !a.is_empty()) {
            out = self.stage(Stage::Aggregate, &out, |ds, sink| {
                aggregate_observed(ds, specs, sink)
            });
        }
        if let Some(config) = rule.obfuscation.as_ref() {
            out = self.stage(Stage::Obfuscate, &out, |ds, sink| {
                obfuscate_observed(ds, config, rng, sink)
            });
        }
        out
    }

    /// Run, then keep the first [`PipelineOptions::preview_rows`] rows as JSON records.
    pub fn preview(&self, dataset: &DataSet, rule: &Rule) -> Preview {
        let out = self.run(dataset, rule);
        let head = out.head(self.options.preview_rows);
        Preview {
            columns: head.column_names(),
            rows: to_json_records(&head),
            total_rows: out.row_count(),
        }
    }

    fn stage<F>(&self, stage: Stage, input: &DataSet, f: F) -> DataSet
    where
        F: FnOnce(&DataSet, &mut dyn FnMut(SkipReason)) -> DataSet,
    {
        let observer = self.options.observer.as_deref();
        let mut sink = |reason: SkipReason| {
            tracing::debug!(?stage, %reason, "rule spec skipped");
            if let Some(obs) = observer {
                obs.on_skip(stage, &reason);
            }
        };
        let out = f(input, &mut sink);
        tracing::trace!(
            ?stage,
            rows_in = input.row_count(),
            rows_out = out.row_count(),
            "stage finished"
        );
        if let Some(obs) = observer {
            obs.on_stage(stage, input.row_count(), out.row_count());
        }
        out
    }
}

/// Run `rule` over `dataset` with default options.
pub fn run(dataset: &DataSet, rule: &Rule) -> DataSet {
    Pipeline::default().run(dataset, rule)
}
