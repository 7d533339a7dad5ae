//! Bounded worker pool
//!
//! Jobs run as tokio tasks gated by a semaphore, so at most `max_workers`
//! units of work execute at once. Each job's status is published on a
//! watch channel that `wait` subscribes to.

use super::InitFlag;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::BoxFuture;
use stackops_common::defaults::DEFAULT_FINISHED_JOB_RETENTION;
use serde::Serialize;
use std::collections::HashMap;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Job lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::TimedOut => "timed-out",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Running => 1,
            _ => 2,
        }
    }

    /// Finished jobs never change status again
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        self.rank() < next.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping for one submitted job
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub description: String,
    pub status: JobStatus,
    pub output: Option<String>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    fn new(id: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            status: JobStatus::Pending,
            output: None,
            exit_code: None,
            error: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Which finished jobs `cleanup` discards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobScope {
    Finished,
    Completed,
    Failed,
    TimedOut,
}

impl JobScope {
    fn matches(self, status: JobStatus) -> bool {
        match self {
            JobScope::Finished => status.is_finished(),
            JobScope::Completed => status == JobStatus::Completed,
            JobScope::Failed => status == JobStatus::Failed,
            JobScope::TimedOut => status == JobStatus::TimedOut,
        }
    }
}

impl FromStr for JobScope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" | "finished" => Ok(JobScope::Finished),
            "completed" => Ok(JobScope::Completed),
            "failed" => Ok(JobScope::Failed),
            "timed-out" => Ok(JobScope::TimedOut),
            other => Err(EngineError::validation(
                "cleanup",
                format!("unknown job scope '{other}'"),
            )),
        }
    }
}

/// A unit of work for [`WorkerPool::batch`]
pub struct BatchJob {
    pub id: String,
    pub description: String,
    pub work: BoxFuture<'static, anyhow::Result<String>>,
}

impl BatchJob {
    pub fn new<F>(id: impl Into<String>, description: impl Into<String>, work: F) -> Self
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        Self {
            id: id.into(),
            description: description.into(),
            work: Box::pin(work),
        }
    }
}

/// Aggregated outcome of a batch. Each job is counted exactly once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub records: Vec<JobRecord>,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl BatchReport {
    fn push(&mut self, record: JobRecord) {
        match record.status {
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::TimedOut => self.timed_out += 1,
            JobStatus::Pending | JobStatus::Running => {}
        }
        self.records.push(record);
    }

    pub fn all_completed(&self) -> bool {
        self.completed == self.records.len()
    }
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub max_workers: usize,
    pub available_workers: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub timed_out: usize,
}

struct JobEntry {
    record: JobRecord,
    status_tx: watch::Sender<JobStatus>,
    handle: Option<JoinHandle<()>>,
}

type JobTable = Mutex<HashMap<String, JobEntry>>;

/// Fixed-size pool of concurrent workers
pub struct WorkerPool {
    max_workers: usize,
    default_timeout: Duration,
    retention: usize,
    semaphore: Arc<Semaphore>,
    jobs: Arc<JobTable>,
    cancel: CancellationToken,
    init: InitFlag,
}

impl WorkerPool {
    pub fn new(max_workers: usize, default_timeout: Duration) -> Self {
        Self {
            max_workers,
            default_timeout,
            retention: DEFAULT_FINISHED_JOB_RETENTION,
            semaphore: Arc::new(Semaphore::new(max_workers)),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
            init: InitFlag::default(),
        }
    }

    /// Cap on finished records kept between `cleanup` calls
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    pub fn initialize(&self) {
        self.init.set();
        debug!(max_workers = self.max_workers, "Worker pool initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.init.is_set()
    }

    /// Submit a unit of work. Returns once the job is queued.
    pub fn execute<F>(
        &self,
        job_id: impl Into<String>,
        description: impl Into<String>,
        work: F,
    ) -> EngineResult<()>
    where
        F: Future<Output = anyhow::Result<String>> + Send + 'static,
    {
        self.init.check("worker pool")?;
        let job_id = job_id.into();
        let description = description.into();

        {
            let mut jobs = lock_jobs(&self.jobs);
            if jobs.contains_key(&job_id) {
                return Err(EngineError::DuplicateJob { job_id });
            }
            prune_finished(&mut jobs, self.retention);
            let (status_tx, _) = watch::channel(JobStatus::Pending);
            jobs.insert(
                job_id.clone(),
                JobEntry {
                    record: JobRecord::new(&job_id, &description),
                    status_tx,
                    handle: None,
                },
            );
        }
        debug!(job = %job_id, description = %description, "Job submitted");

        let jobs = Arc::clone(&self.jobs);
        let semaphore = Arc::clone(&self.semaphore);
        let cancel = self.cancel.clone();
        let id = job_id.clone();
        let handle = tokio::spawn(async move {
            let permit = tokio::select! {
                permit = semaphore.acquire_owned() => permit.ok(),
                _ = cancel.cancelled() => None,
            };
            let Some(_permit) = permit else {
                transition(&jobs, &id, JobStatus::Failed, |r| {
                    r.error = Some("worker pool shut down".to_string());
                    r.exit_code = Some(-1);
                });
                return;
            };
            // A job that timed out while queued never starts
            if !transition(&jobs, &id, JobStatus::Running, |_| {}) {
                return;
            }

            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(Ok(output)) => {
                    transition(&jobs, &id, JobStatus::Completed, |r| {
                        r.output = Some(output);
                        r.exit_code = Some(0);
                    });
                }
                Ok(Err(e)) => {
                    let msg = format!("{e:#}");
                    warn!(job = %id, error = %msg, "Job failed");
                    transition(&jobs, &id, JobStatus::Failed, |r| {
                        r.error = Some(msg);
                        r.exit_code = Some(1);
                    });
                }
                Err(payload) => {
                    let msg = format!("panicked: {}", panic_message(payload.as_ref()));
                    warn!(job = %id, error = %msg, "Job panicked");
                    transition(&jobs, &id, JobStatus::Failed, |r| {
                        r.error = Some(msg);
                        r.exit_code = Some(101);
                    });
                }
            }
        });

        if let Some(entry) = lock_jobs(&self.jobs).get_mut(&job_id) {
            entry.handle = Some(handle);
        }
        Ok(())
    }

    /// Block until the job finishes or `timeout` elapses.
    ///
    /// On timeout the job is marked timed-out and its task aborted; the
    /// returned record reflects that rather than an error.
    pub async fn wait(&self, job_id: &str, timeout: Option<Duration>) -> EngineResult<JobRecord> {
        self.init.check("worker pool")?;
        let mut rx = {
            let jobs = lock_jobs(&self.jobs);
            let entry = jobs.get(job_id).ok_or_else(|| EngineError::UnknownJob {
                job_id: job_id.to_string(),
            })?;
            entry.status_tx.subscribe()
        };

        let timeout = timeout.unwrap_or(self.default_timeout);
        let finished = tokio::time::timeout(timeout, rx.wait_for(|s| s.is_finished()))
            .await
            .is_ok();

        if !finished {
            let err = EngineError::Timeout {
                job_id: job_id.to_string(),
                timeout,
            };
            let timed_out = transition(&self.jobs, job_id, JobStatus::TimedOut, |r| {
                r.error = Some(err.to_string());
            });
            if timed_out {
                warn!(job = %job_id, timeout_ms = timeout.as_millis() as u64, "Job timed out");
                let handle = lock_jobs(&self.jobs)
                    .get_mut(job_id)
                    .and_then(|e| e.handle.take());
                if let Some(handle) = handle {
                    handle.abort();
                }
            }
        }

        self.status(job_id)
    }

    /// Submit every job, then wait for all of them within one deadline.
    ///
    /// If any job is rejected at submission, the ones already submitted
    /// are aborted and dropped before the error is returned.
    pub async fn batch(
        &self,
        jobs: Vec<BatchJob>,
        timeout: Option<Duration>,
    ) -> EngineResult<BatchReport> {
        self.init.check("worker pool")?;
        let mut ids = Vec::with_capacity(jobs.len());
        for job in jobs {
            let id = job.id.clone();
            if let Err(e) = self.execute(job.id, job.description, job.work) {
                self.abandon(&ids);
                return Err(e);
            }
            ids.push(id);
        }

        let deadline = Instant::now() + timeout.unwrap_or(self.default_timeout);
        let mut report = BatchReport::default();
        for id in ids {
            let remaining = deadline.saturating_duration_since(Instant::now());
            report.push(self.wait(&id, Some(remaining)).await?);
        }

        debug!(
            completed = report.completed,
            failed = report.failed,
            timed_out = report.timed_out,
            "Batch finished"
        );
        Ok(report)
    }

    fn abandon(&self, ids: &[String]) {
        let mut jobs = lock_jobs(&self.jobs);
        for id in ids {
            if let Some(handle) = jobs.remove(id).and_then(|e| e.handle) {
                handle.abort();
            }
        }
        if !ids.is_empty() {
            warn!(abandoned = ids.len(), "Batch submission failed, aborted submitted jobs");
        }
    }

    /// Current record for a job
    pub fn status(&self, job_id: &str) -> EngineResult<JobRecord> {
        self.init.check("worker pool")?;
        lock_jobs(&self.jobs)
            .get(job_id)
            .map(|e| e.record.clone())
            .ok_or_else(|| EngineError::UnknownJob {
                job_id: job_id.to_string(),
            })
    }

    /// Discard bookkeeping for finished jobs in `scope`. Returns the count.
    pub fn cleanup(&self, scope: JobScope) -> EngineResult<usize> {
        self.init.check("worker pool")?;
        let mut jobs = lock_jobs(&self.jobs);
        let before = jobs.len();
        jobs.retain(|_, e| !(e.record.status.is_finished() && scope.matches(e.record.status)));
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, scope = ?scope, "Discarded finished jobs");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> EngineResult<PoolStats> {
        self.init.check("worker pool")?;
        let jobs = lock_jobs(&self.jobs);
        let mut stats = PoolStats {
            max_workers: self.max_workers,
            available_workers: self.semaphore.available_permits(),
            ..Default::default()
        };
        for entry in jobs.values() {
            match entry.record.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::TimedOut => stats.timed_out += 1,
            }
        }
        Ok(stats)
    }

    /// Fail jobs still waiting for a worker. Running jobs finish normally.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        info!("Worker pool shutting down");
    }
}

fn lock_jobs(jobs: &JobTable) -> MutexGuard<'_, HashMap<String, JobEntry>> {
    jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Drop the oldest finished records so that, with the job about to be
/// submitted, no more than `retention` finished ones accumulate.
fn prune_finished(jobs: &mut HashMap<String, JobEntry>, retention: usize) {
    let mut finished: Vec<(DateTime<Utc>, String)> = jobs
        .iter()
        .filter_map(|(id, e)| e.record.finished_at.map(|at| (at, id.clone())))
        .collect();
    if finished.len() < retention {
        return;
    }
    finished.sort();
    let excess = finished.len() + 1 - retention.max(1);
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
    debug!(pruned = excess, "Pruned finished jobs past retention");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

/// Apply a forward-only transition. Returns false if the job already moved on.
fn transition(
    jobs: &JobTable,
    job_id: &str,
    next: JobStatus,
    update: impl FnOnce(&mut JobRecord),
) -> bool {
    let mut jobs = lock_jobs(jobs);
    let Some(entry) = jobs.get_mut(job_id) else {
        return false;
    };
    if !entry.record.status.can_transition_to(next) {
        return false;
    }
    entry.record.status = next;
    if next.is_finished() {
        entry.record.finished_at = Some(Utc::now());
    }
    update(&mut entry.record);
    entry.status_tx.send_replace(next);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(workers: usize) -> WorkerPool {
        let pool = WorkerPool::new(workers, Duration::from_secs(30));
        pool.initialize();
        pool
    }

    #[test]
    fn test_transitions_are_monotonic() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(TimedOut));
        assert!(Running.can_transition_to(Completed));
        assert!(!Running.can_transition_to(Pending));
        for done in [Completed, Failed, TimedOut] {
            for next in [Pending, Running, Completed, Failed, TimedOut] {
                assert!(!done.can_transition_to(next));
            }
        }
    }

    #[tokio::test]
    async fn test_requires_initialize() {
        let pool = WorkerPool::new(1, Duration::from_secs(1));
        let err = pool.execute("j", "noop", async { Ok(String::new()) }).unwrap_err();
        assert!(matches!(err, EngineError::NotInitialized { .. }));
        assert!(pool.stats().is_err());
    }

    #[tokio::test]
    async fn test_execute_and_wait() {
        let pool = pool(2);
        pool.execute("j1", "echo", async { Ok("hello".to_string()) })
            .unwrap();

        let record = pool.wait("j1", None).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.output.as_deref(), Some("hello"));
        assert_eq!(record.exit_code, Some(0));
        assert!(record.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_job_records_error() {
        let pool = pool(1);
        pool.execute("j1", "boom", async { anyhow::bail!("disk full") })
            .unwrap();

        let record = pool.wait("j1", None).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.exit_code, Some(1));
        assert!(record.error.unwrap().contains("disk full"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_marks_timed_out() {
        let pool = pool(1);
        pool.execute("slow", "sleep", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("late".to_string())
        })
        .unwrap();

        let record = pool.wait("slow", Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(record.status, JobStatus::TimedOut);
        assert_eq!(
            record.error.as_deref(),
            Some("Job 'slow' timed out after 1s")
        );

        // The task was aborted; the status never regresses or completes
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(pool.status("slow").unwrap().status, JobStatus::TimedOut);
        assert_eq!(pool.stats().unwrap().available_workers, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_is_failed_not_timed_out() {
        let pool = pool(1);
        pool.execute("crash", "panics", async {
            if true {
                panic!("index out of bounds");
            }
            Ok(String::new())
        })
        .unwrap();

        let started = Instant::now();
        let record = pool.wait("crash", None).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.exit_code, Some(101));
        assert_eq!(record.error.as_deref(), Some("panicked: index out of bounds"));
        assert!(started.elapsed() < Duration::from_secs(30));

        // The worker permit is returned
        pool.execute("next", "runs", async { Ok("ok".to_string()) })
            .unwrap();
        let next = pool.wait("next", None).await.unwrap();
        assert_eq!(next.status, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let pool = pool(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs = (0..6)
            .map(|i| {
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                BatchJob::new(format!("j{i}"), "tick", async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(String::new())
                })
            })
            .collect();

        let report = pool.batch(jobs, None).await.unwrap();
        assert!(report.all_completed());
        assert_eq!(report.records.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_counts_each_outcome_once() {
        let pool = pool(3);
        let jobs = vec![
            BatchJob::new("ok", "ok", async { Ok("done".to_string()) }),
            BatchJob::new("bad", "bad", async { anyhow::bail!("nope") }),
            BatchJob::new("slow", "slow", async {
                tokio::time::sleep(Duration::from_secs(600)).await;
                Ok(String::new())
            }),
        ];

        let report = pool.batch(jobs, Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(report.completed, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.timed_out, 1);
        assert_eq!(report.records.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_batch_aborts_submitted_jobs() {
        let pool = pool(4);
        pool.execute("taken", "already here", async { Ok(String::new()) })
            .unwrap();
        pool.wait("taken", None).await.unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let job = |id: &str| {
            let ran = Arc::clone(&ran);
            BatchJob::new(id, "counts", async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(String::new())
            })
        };
        let jobs = vec![job("first"), job("second"), job("taken"), job("never")];

        let err = pool.batch(jobs, None).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateJob { ref job_id } if job_id == "taken"));
        for id in ["first", "second", "never"] {
            assert!(matches!(
                pool.status(id),
                Err(EngineError::UnknownJob { .. })
            ));
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(pool.stats().unwrap().available_workers, 4);
        assert_eq!(pool.status("taken").unwrap().status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_finished_jobs_pruned_past_retention() {
        let pool = WorkerPool::new(1, Duration::from_secs(30)).with_retention(2);
        pool.initialize();
        for i in 0..5 {
            let id = format!("j{i}");
            pool.execute(id.clone(), "noop", async { Ok(String::new()) })
                .unwrap();
            pool.wait(&id, None).await.unwrap();
        }

        assert_eq!(pool.stats().unwrap().completed, 2);
        assert!(pool.status("j0").is_err());
        assert!(pool.status("j2").is_err());
        assert!(pool.status("j3").is_ok());
        assert!(pool.status("j4").is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_job_rejected() {
        let pool = pool(1);
        pool.execute("j", "a", async { Ok(String::new()) }).unwrap();
        let err = pool.execute("j", "b", async { Ok(String::new()) }).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateJob { .. }));
    }

    #[tokio::test]
    async fn test_cleanup_by_scope() {
        let pool = pool(2);
        pool.execute("ok", "ok", async { Ok(String::new()) }).unwrap();
        pool.execute("bad", "bad", async { anyhow::bail!("x") }).unwrap();
        pool.wait("ok", None).await.unwrap();
        pool.wait("bad", None).await.unwrap();

        assert_eq!(pool.cleanup(JobScope::Completed).unwrap(), 1);
        assert!(pool.status("ok").is_err());
        assert_eq!(pool.status("bad").unwrap().status, JobStatus::Failed);
        assert_eq!(pool.cleanup(JobScope::Finished).unwrap(), 1);
        assert_eq!(pool.stats().unwrap(), PoolStats {
            max_workers: 2,
            available_workers: 2,
            ..Default::default()
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_fails_queued_jobs() {
        let pool = pool(1);
        pool.execute("busy", "hold the only worker", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(String::new())
        })
        .unwrap();
        pool.execute("queued", "never runs", async { Ok(String::new()) })
            .unwrap();

        tokio::task::yield_now().await;
        pool.shutdown();

        let record = pool.wait("queued", Some(Duration::from_secs(1))).await.unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("worker pool shut down"));

        let busy = pool.wait("busy", None).await.unwrap();
        assert_eq!(busy.status, JobStatus::Completed);
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("all".parse::<JobScope>().unwrap(), JobScope::Finished);
        assert_eq!("timed-out".parse::<JobScope>().unwrap(), JobScope::TimedOut);
        assert!("running".parse::<JobScope>().is_err());
    }
}
