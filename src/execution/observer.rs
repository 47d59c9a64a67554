use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted { jobs: usize },
    ThrottleWaited { job: usize, duration: Duration },
    JobStarted { job: usize, rows_in: usize },
    JobFinished { job: usize, rows_out: usize },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// A simple stderr logger for execution events.
#[derive(Debug, Default)]
pub struct StdErrExecutionObserver;

impl ExecutionObserver for StdErrExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunFinished { metrics, .. } => eprintln!("[exec][done] {metrics}"),
            other => eprintln!("[exec] {other:?}"),
        }
    }
}

/// Real-time metrics for a batch run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
#[derive(Debug)]
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    jobs_started: AtomicU64,
    jobs_finished: AtomicU64,
    rows_in: AtomicU64,
    rows_out: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_jobs: AtomicUsize,
    max_active_jobs: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            jobs_started: AtomicU64::new(0),
            jobs_finished: AtomicU64::new(0),
            rows_in: AtomicU64::new(0),
            rows_out: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_jobs: AtomicUsize::new(0),
            max_active_jobs: AtomicUsize::new(0),
        }
    }

    pub(crate) fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.jobs_started.store(0, Ordering::SeqCst);
        self.jobs_finished.store(0, Ordering::SeqCst);
        self.rows_in.store(0, Ordering::SeqCst);
        self.rows_out.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_jobs.store(0, Ordering::SeqCst);
        self.max_active_jobs.store(0, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub(crate) fn on_job_start(&self, rows_in: usize) {
        let _ = self.jobs_started.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_in.fetch_add(rows_in as u64, Ordering::SeqCst);
        let now = self.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        update_max_usize(&self.max_active_jobs, now);
    }

    pub(crate) fn on_job_end(&self, rows_out: usize) {
        let _ = self.jobs_finished.fetch_add(1, Ordering::SeqCst);
        let _ = self.rows_out.fetch_add(rows_out as u64, Ordering::SeqCst);
        let _ = self.active_jobs.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_throttle_wait(&self, d: Duration) {
        let _ = self.throttle_wait_ns.fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns));

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            jobs_started: self.jobs_started.load(Ordering::SeqCst),
            jobs_finished: self.jobs_finished.load(Ordering::SeqCst),
            rows_in: self.rows_in.load(Ordering::SeqCst),
            rows_out: self.rows_out.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_jobs: self.max_active_jobs.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

fn update_max_usize(dst: &AtomicUsize, now: usize) {
    let _ = dst.fetch_max(now, Ordering::SeqCst);
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub jobs_started: u64,
    pub jobs_finished: u64,
    pub rows_in: u64,
    pub rows_out: u64,
    pub throttle_wait: Duration,
    pub max_active_jobs: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, jobs={}/{}, rows_in={}, rows_out={}, max_active_jobs={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.jobs_finished,
            self.jobs_started,
            self.rows_in,
            self.rows_out,
            self.max_active_jobs,
            self.throttle_wait,
            self.elapsed
        )
    }
}
