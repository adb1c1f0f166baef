//! Recurring background jobs
//!
//! Every registered [`Job`] gets its own tokio task. The task runs the job
//! immediately, then once per interval until the scheduler is stopped or the
//! context token passed to [`Scheduler::start`] is cancelled. Ticks of one job
//! never overlap; separate jobs run in parallel.
//!
//! ```rust,ignore
//! let scheduler = Scheduler::new();
//! scheduler.register(retention.create_retention_job())?;
//! scheduler.start(&shutdown)?;
//! // ...
//! scheduler.stop(Duration::from_secs(30)).await?;
//! ```

pub mod error;
pub mod job;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::observability::Metrics;

pub use error::{Result, SchedulerError};
pub use job::{Job, JobFn, JobFuture, job_fn};

struct Running {
    stop: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct Inner {
    jobs: Vec<Job>,
    running: Option<Running>,
}

/// Single-process job runner
#[derive(Default)]
pub struct Scheduler {
    inner: Mutex<Inner>,
    metrics: Option<Arc<Metrics>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count failed ticks in the shared metrics
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self {
            inner: Mutex::default(),
            metrics: Some(metrics),
        }
    }

    /// Add a job; only allowed before `start`
    pub fn register(&self, job: Job) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.running.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        if job.name.trim().is_empty() {
            return Err(SchedulerError::InvalidJob("name is required".to_string()));
        }
        if job.interval.is_zero() {
            return Err(SchedulerError::InvalidJob(format!(
                "{}: interval must be positive",
                job.name
            )));
        }
        if job.action.is_none() {
            return Err(SchedulerError::InvalidJob(format!(
                "{}: action is required",
                job.name
            )));
        }
        if inner.jobs.iter().any(|existing| existing.name == job.name) {
            return Err(SchedulerError::InvalidJob(format!(
                "{}: already registered",
                job.name
            )));
        }

        info!(job = %job.name, interval_secs = job.interval.as_secs(), "Registered job");
        inner.jobs.push(job);
        Ok(())
    }

    /// Spawn one worker per job; workers also stop when `ctx` is cancelled
    pub fn start(&self, ctx: &CancellationToken) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.running.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        let stop = ctx.child_token();
        let handles = inner
            .jobs
            .iter()
            .filter_map(|job| {
                let action = job.action.clone()?;
                Some(tokio::spawn(run_worker(
                    job.name.clone(),
                    job.interval,
                    action,
                    stop.clone(),
                    self.metrics.clone(),
                )))
            })
            .collect();

        info!(jobs = inner.jobs.len(), "Scheduler started");
        inner.running = Some(Running { stop, handles });
        Ok(())
    }

    /// Signal all workers and wait up to `timeout` for them to exit
    ///
    /// Workers still busy at the deadline are left to finish on their own;
    /// the scheduler counts as stopped either way and may be started again.
    pub async fn stop(&self, timeout: Duration) -> Result<()> {
        let running = self
            .inner
            .lock()
            .running
            .take()
            .ok_or(SchedulerError::NotRunning)?;

        running.stop.cancel();

        let wait_all = async move {
            for handle in running.handles {
                let _ = handle.await;
            }
        };

        match tokio::time::timeout(timeout, wait_all).await {
            Ok(()) => {
                info!("Scheduler stopped");
                Ok(())
            }
            Err(_) => {
                warn!(timeout_ms = timeout.as_millis() as u64, "Scheduler stop timed out");
                Err(SchedulerError::ShutdownTimeout(timeout))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().running.is_some()
    }

    pub fn job_names(&self) -> Vec<String> {
        self.inner.lock().jobs.iter().map(|job| job.name.clone()).collect()
    }
}

async fn run_worker(
    name: String,
    interval: Duration,
    action: JobFn,
    stop: CancellationToken,
    metrics: Option<Arc<Metrics>>,
) {
    debug!(job = %name, "Job worker started");

    // First tick completes immediately
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                if !run_tick(&name, &action, &stop).await {
                    if let Some(metrics) = &metrics {
                        metrics.job_failed();
                    }
                }
            }
        }
    }

    debug!(job = %name, "Job worker exited");
}

/// Run one invocation in its own task so a panic stays inside the tick
async fn run_tick(name: &str, action: &JobFn, stop: &CancellationToken) -> bool {
    let action = action.clone();
    let token = stop.clone();

    match tokio::spawn(async move { action(token).await }).await {
        Ok(Ok(())) => {
            debug!(job = %name, "Job tick completed");
            true
        }
        Ok(Err(e)) => {
            error!(job = %name, error = %e, "Job tick failed");
            false
        }
        Err(join_err) if join_err.is_panic() => {
            error!(job = %name, "Job tick panicked");
            false
        }
        Err(join_err) => {
            error!(job = %name, error = %join_err, "Job tick aborted");
            false
        }
    }
}
