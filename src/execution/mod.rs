//! Execution engine for running batches of pipeline jobs with configurable parallelism.
//!
//! This module sits "above" [`crate::pipeline`] and provides:
//!
//! - Parallel execution of independent `(dataset, rule)` jobs
//! - Resource limits / throttling (in-flight jobs)
//! - Real-time metrics + observer hooks for monitoring
//! - Reproducible noise: with a `base_seed`, job `i` draws from a generator seeded with
//!   `base_seed + i`, whatever the scheduling order

mod observer;
mod semaphore;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::error::ExecutionError;
use crate::pipeline::{Pipeline, PipelineObserver, PipelineOptions};
use crate::rule::Rule;
use crate::types::DataSet;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, StdErrExecutionObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on concurrently executing jobs.
    ///
    /// This is an additional throttle on top of `num_threads`.
    pub max_in_flight_jobs: usize,
    /// Seed for job noise. `None` draws each job's generator from OS entropy.
    pub base_seed: Option<u64>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_threads();
        Self {
            num_threads: Some(n),
            max_in_flight_jobs: n,
            base_seed: None,
        }
    }
}

/// One unit of work: a rule applied to a dataset.
#[derive(Debug, Clone, Copy)]
pub struct PipelineJob<'a> {
    pub dataset: &'a DataSet,
    pub rule: &'a Rule,
}

impl<'a> PipelineJob<'a> {
    pub fn new(dataset: &'a DataSet, rule: &'a Rule) -> Self {
        Self { dataset, rule }
    }
}

/// A configurable execution engine for batches of pipeline runs.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    pipeline_observer: Option<Arc<dyn PipelineObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl std::fmt::Debug for ExecutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionEngine")
            .field("opts", &self.opts)
            .field("threads", &self.pool.current_num_threads())
            .field("observer_set", &self.observer.is_some())
            .field("pipeline_observer_set", &self.pipeline_observer.is_some())
            .finish()
    }
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails if `max_in_flight_jobs == 0`, `num_threads == Some(0)`, or the thread pool cannot
    /// be built.
    pub fn new(opts: ExecutionOptions) -> Result<Self, ExecutionError> {
        if opts.max_in_flight_jobs == 0 {
            return Err(ExecutionError::InvalidOptions {
                message: "max_in_flight_jobs must be > 0".to_string(),
            });
        }
        if opts.num_threads == Some(0) {
            return Err(ExecutionError::InvalidOptions {
                message: "num_threads must be > 0 when set".to_string(),
            });
        }

        let n_threads = opts.num_threads.unwrap_or_else(available_threads);
        let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            pipeline_observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Attach an observer handed to every job's [`Pipeline`].
    pub fn with_pipeline_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.pipeline_observer = Some(observer);
        self
    }

    /// Options in effect.
    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run every job, returning the outputs in job order.
    pub fn run_batch(&self, jobs: &[PipelineJob<'_>]) -> Vec<DataSet> {
        self.pool.install(|| self.run_batch_impl(jobs))
    }

    fn run_batch_impl(&self, jobs: &[PipelineJob<'_>]) -> Vec<DataSet> {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted { jobs: jobs.len() });
        tracing::debug!(jobs = jobs.len(), "batch started");

        let sem = Semaphore::new(self.opts.max_in_flight_jobs);

        let out: Vec<DataSet> = jobs
            .par_iter()
            .enumerate()
            .map(|(idx, job)| {
                let waited = sem.acquire();
                if waited > Duration::ZERO {
                    self.metrics.on_throttle_wait(waited);
                    self.emit(ExecutionEvent::ThrottleWaited {
                        job: idx,
                        duration: waited,
                    });
                }

                let rows_in = job.dataset.row_count();
                self.metrics.on_job_start(rows_in);
                self.emit(ExecutionEvent::JobStarted { job: idx, rows_in });

                let result = self.pipeline_for(idx).run(job.dataset, job.rule);

                self.emit(ExecutionEvent::JobFinished {
                    job: idx,
                    rows_out: result.row_count(),
                });
                self.metrics.on_job_end(result.row_count());
                sem.release();
                result
            })
            .collect();

        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        let snapshot = self.metrics.snapshot();
        tracing::debug!(%snapshot, "batch finished");
        self.emit(ExecutionEvent::RunFinished {
            elapsed,
            metrics: snapshot,
        });

        out
    }

    fn pipeline_for(&self, job: usize) -> Pipeline {
        Pipeline::new(PipelineOptions {
            seed: self.opts.base_seed.map(|s| s.wrapping_add(job as u64)),
            observer: self.pipeline_observer.clone(),
            ..PipelineOptions::default()
        })
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn available_threads() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::{ExecutionEngine, ExecutionOptions, PipelineJob};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::execution::{ExecutionEvent, ExecutionObserver};
    use crate::pipeline::{Pipeline, PipelineOptions};
    use crate::rule::Rule;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn dataset_of_n(n: usize) -> DataSet {
        let schema = Schema::new(vec![Field::new("amount", DataType::Number)]);
        let rows = (0..n).map(|i| vec![Value::Number(i as f64)]).collect();
        DataSet::new(schema, rows)
    }

    fn noisy_rule() -> Rule {
        Rule::from_json(r#"{"obfuscation": {"jitter": {"fields": ["amount"], "percent": 10}}}"#).unwrap()
    }

    struct ConcurrencyObserver {
        active_jobs: AtomicUsize,
        max_active_jobs: AtomicUsize,
    }

    impl ConcurrencyObserver {
        fn new() -> Self {
            Self {
                active_jobs: AtomicUsize::new(0),
                max_active_jobs: AtomicUsize::new(0),
            }
        }
        fn max(&self) -> usize {
            self.max_active_jobs.load(Ordering::SeqCst)
        }
    }

    impl ExecutionObserver for ConcurrencyObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::JobStarted { .. } => {
                    let now = self.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active_jobs.fetch_max(now, Ordering::SeqCst);
                }
                ExecutionEvent::JobFinished { .. } => {
                    let _ = self.active_jobs.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn rejects_zero_limits() {
        let err = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(2),
            max_in_flight_jobs: 0,
            base_seed: None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("max_in_flight_jobs"));

        assert!(ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(0),
            max_in_flight_jobs: 1,
            base_seed: None,
        })
        .is_err());
    }

    #[test]
    fn results_follow_job_order() {
        let datasets: Vec<DataSet> = (1..=8).map(dataset_of_n).collect();
        let rule = Rule::default();
        let jobs: Vec<PipelineJob<'_>> = datasets.iter().map(|ds| PipelineJob::new(ds, &rule)).collect();

        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_jobs: 4,
            base_seed: None,
        })
        .unwrap();
        let out = engine.run_batch(&jobs);

        let counts: Vec<usize> = out.iter().map(DataSet::row_count).collect();
        assert_eq!(counts, (1..=8).collect::<Vec<_>>());
    }

    #[test]
    fn seeded_jobs_match_standalone_pipeline() {
        let ds = dataset_of_n(20);
        let rule = noisy_rule();
        let jobs = vec![PipelineJob::new(&ds, &rule); 3];

        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(3),
            max_in_flight_jobs: 3,
            base_seed: Some(41),
        })
        .unwrap();
        let out = engine.run_batch(&jobs);

        for (idx, got) in out.iter().enumerate() {
            let expected = Pipeline::new(PipelineOptions {
                seed: Some(41 + idx as u64),
                ..PipelineOptions::default()
            })
            .run(&ds, &rule);
            assert_eq!(got, &expected);
        }
        assert_ne!(out[0], out[1]);
    }

    #[test]
    fn max_in_flight_jobs_throttles_concurrency() {
        let ds = dataset_of_n(2_000);
        let rule = noisy_rule();
        let jobs = vec![PipelineJob::new(&ds, &rule); 12];

        let observer = Arc::new(ConcurrencyObserver::new());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight_jobs: 1,
            base_seed: Some(7),
        })
        .unwrap()
        .with_observer(obs_trait);

        let out = engine.run_batch(&jobs);
        assert_eq!(out.len(), jobs.len());
        assert_eq!(observer.max(), 1);
    }

    #[test]
    fn metrics_are_available_after_run() {
        let ds = dataset_of_n(10);
        let rule = Rule::from_json(r#"{"filters": [{"field": "amount", "op": "gte", "value": 5}]}"#).unwrap();
        let jobs = vec![PipelineJob::new(&ds, &rule); 4];

        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(2),
            max_in_flight_jobs: 1,
            base_seed: None,
        })
        .unwrap();
        let metrics = engine.metrics();
        engine.run_batch(&jobs);

        let snap = metrics.snapshot();
        assert_eq!(snap.run_id, 1);
        assert_eq!(snap.jobs_started, 4);
        assert_eq!(snap.jobs_finished, 4);
        assert_eq!(snap.rows_in, 40);
        assert_eq!(snap.rows_out, 20);
        assert_eq!(snap.max_active_jobs, 1);
        assert!(snap.elapsed.is_some());
    }
}
