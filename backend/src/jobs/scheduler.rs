// Job Scheduler - fixed-delay recurring jobs gated by the lock coordinator

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::env;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::lock::LockCoordinator;
use super::MaintenanceJobs;
use crate::error::StoreError;
use crate::notifications::{NotificationDispatcher, NotificationStore, PushChannel, RecipientResolver, RoleDirectory};
use crate::sla::{DocumentStore, SlaEvaluator};

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Job execution error: {0}")]
    Execution(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Scheduler already started")]
    AlreadyStarted,
    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

pub type JobResult<T> = Result<T, JobError>;

pub const SLA_BREACH_JOB: &str = "sla_breach_check";
pub const SLA_WARNING_JOB: &str = "sla_warning_check";
pub const NOTIFICATION_CLEANUP_JOB: &str = "notification_cleanup";
pub const INITIAL_RUN_JOB: &str = "initial_run";

const MAX_EXECUTION_LOGS: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    // SLA checks
    pub sla_breach_interval_secs: u64,
    pub sla_breach_lock_ttl_secs: u64,
    pub sla_warning_interval_secs: u64,
    pub sla_warning_lock_ttl_secs: u64,

    // Maintenance
    pub cleanup_interval_secs: u64,
    pub cleanup_lock_ttl_secs: u64,
    pub notification_retention_days: i64,

    // Startup burst
    pub initial_run_delay_secs: u64,
    pub initial_run_lock_ttl_secs: u64,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            // Breaches every 5 minutes, warnings every 15
            sla_breach_interval_secs: 300,
            sla_breach_lock_ttl_secs: 240,
            sla_warning_interval_secs: 900,
            sla_warning_lock_ttl_secs: 840,

            // Daily cleanup
            cleanup_interval_secs: 86_400,
            cleanup_lock_ttl_secs: 82_800,
            notification_retention_days: 90,

            initial_run_delay_secs: 30,
            initial_run_lock_ttl_secs: 60,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl JobConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sla_breach_interval_secs: env_or("SLA_BREACH_INTERVAL_SECS", defaults.sla_breach_interval_secs),
            sla_breach_lock_ttl_secs: env_or("SLA_BREACH_LOCK_TTL_SECS", defaults.sla_breach_lock_ttl_secs),
            sla_warning_interval_secs: env_or("SLA_WARNING_INTERVAL_SECS", defaults.sla_warning_interval_secs),
            sla_warning_lock_ttl_secs: env_or("SLA_WARNING_LOCK_TTL_SECS", defaults.sla_warning_lock_ttl_secs),
            cleanup_interval_secs: env_or("CLEANUP_INTERVAL_SECS", defaults.cleanup_interval_secs),
            cleanup_lock_ttl_secs: env_or("CLEANUP_LOCK_TTL_SECS", defaults.cleanup_lock_ttl_secs),
            notification_retention_days: env_or(
                "NOTIFICATION_RETENTION_DAYS",
                defaults.notification_retention_days,
            ),
            initial_run_delay_secs: env_or("INITIAL_RUN_DELAY_SECS", defaults.initial_run_delay_secs),
            initial_run_lock_ttl_secs: env_or("INITIAL_RUN_LOCK_TTL_SECS", defaults.initial_run_lock_ttl_secs),
        }
    }

    /// Every recurring job needs a non-zero interval and a lock TTL strictly
    /// below it.
    pub fn validate(&self) -> JobResult<()> {
        let pairs = [
            (SLA_BREACH_JOB, self.sla_breach_interval_secs, self.sla_breach_lock_ttl_secs),
            (SLA_WARNING_JOB, self.sla_warning_interval_secs, self.sla_warning_lock_ttl_secs),
            (NOTIFICATION_CLEANUP_JOB, self.cleanup_interval_secs, self.cleanup_lock_ttl_secs),
        ];

        for (name, interval, ttl) in pairs {
            if interval == 0 {
                return Err(JobError::Config(format!("{} interval must be positive", name)));
            }
            if ttl == 0 || ttl >= interval {
                return Err(JobError::Config(format!(
                    "{} lock TTL ({}s) must be positive and below its interval ({}s)",
                    name, ttl, interval
                )));
            }
        }

        if self.initial_run_lock_ttl_secs == 0 {
            return Err(JobError::Config("initial run lock TTL must be positive".to_string()));
        }
        if self.notification_retention_days <= 0 {
            return Err(JobError::Config("notification retention must be positive".to_string()));
        }

        Ok(())
    }
}

pub type JobAction = Arc<dyn Fn() -> BoxFuture<'static, JobResult<()>> + Send + Sync>;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clones share the in-flight flag, so the loop and `run_job_now` never run
/// the same job concurrently in one process.
#[derive(Clone)]
pub struct JobDefinition {
    pub name: String,
    pub action: JobAction,
    pub interval: Duration,
    pub lock_ttl: Duration,
    running: Arc<AtomicBool>,
}

impl JobDefinition {
    pub fn new<F, Fut>(name: impl Into<String>, interval: Duration, lock_ttl: Duration, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(move || action().boxed()),
            interval,
            lock_ttl,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn try_claim(&self) -> Option<RunningGuard> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(self.running.clone()))
    }
}

/// Clears the in-flight flag when the run ends, panics included.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for JobDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDefinition")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("lock_ttl", &self.lock_ttl)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecutionLog {
    pub id: Uuid,
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub status: JobStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobStatus {
    Completed,
    Failed,
    /// Another instance held the lock.
    Skipped,
}

type ExecutionLogs = Arc<RwLock<VecDeque<JobExecutionLog>>>;

/// One tick: claim the job in this process, take the lock, run the action,
/// record the outcome. Errors and panics from the action end here.
async fn execute(job: &JobDefinition, lock: &LockCoordinator, logs: &ExecutionLogs) -> JobStatus {
    let started_at = Utc::now();
    let claim = job.try_claim();

    let (status, error) = if claim.is_none() {
        debug!(job = %job.name, "Skipping run, already in flight in this process");
        (JobStatus::Skipped, None)
    } else if !lock.acquire(&job.name, job.lock_ttl).await {
        debug!(job = %job.name, "Skipping run, lock not acquired");
        (JobStatus::Skipped, None)
    } else {
        match AssertUnwindSafe((job.action)()).catch_unwind().await {
            Ok(Ok(())) => {
                debug!(job = %job.name, "Job run completed");
                (JobStatus::Completed, None)
            }
            Ok(Err(e)) => {
                error!(job = %job.name, "Job run failed: {}", e);
                (JobStatus::Failed, Some(e.to_string()))
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "job panicked".to_string());
                error!(job = %job.name, "Job run panicked: {}", message);
                (JobStatus::Failed, Some(message))
            }
        }
    };
    drop(claim);

    let mut logs = logs.write().await;
    logs.push_back(JobExecutionLog {
        id: Uuid::new_v4(),
        job_name: job.name.clone(),
        started_at,
        completed_at: Utc::now(),
        status,
        error,
    });
    while logs.len() > MAX_EXECUTION_LOGS {
        logs.pop_front();
    }

    status
}

/// Fixed-delay loop: wait a full interval, run, and only then start the next
/// wait, so one process never overlaps runs of the same job.
async fn run_fixed_delay(job: JobDefinition, lock: LockCoordinator, cancel: CancellationToken, logs: ExecutionLogs) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(job.interval) => {}
        }

        if cancel.is_cancelled() {
            break;
        }

        execute(&job, &lock, &logs).await;
    }

    debug!(job = %job.name, "Job loop stopped");
}

pub struct JobScheduler {
    config: JobConfig,
    lock: LockCoordinator,
    documents: Arc<dyn DocumentStore>,
    notifications: Arc<dyn NotificationStore>,
    directory: Arc<dyn RoleDirectory>,
    clock: Clock,
    cancel: CancellationToken,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
    roster: Mutex<Vec<JobDefinition>>,
    execution_logs: ExecutionLogs,
}

impl JobScheduler {
    pub fn new(
        config: JobConfig,
        lock: LockCoordinator,
        documents: Arc<dyn DocumentStore>,
        notifications: Arc<dyn NotificationStore>,
        directory: Arc<dyn RoleDirectory>,
    ) -> Self {
        Self {
            config,
            lock,
            documents,
            notifications,
            directory,
            clock: Arc::new(Utc::now),
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
            roster: Mutex::new(Vec::new()),
            execution_logs: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    /// Replaces the wall clock used to evaluate deadlines.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Registers the fixed roster and arms the initial run. A scheduler starts
    /// once; build a new one after `stop`.
    pub fn start(&self, push: Option<Arc<dyn PushChannel>>) -> JobResult<()> {
        self.config.validate()?;

        if self.started.swap(true, Ordering::SeqCst) {
            return Err(JobError::AlreadyStarted);
        }

        info!(holder = %self.lock.holder(), "Starting SLA job scheduler");

        let dispatcher = NotificationDispatcher::new(self.notifications.clone(), push);
        let evaluator = SlaEvaluator::new(
            self.documents.clone(),
            RecipientResolver::new(self.directory.clone()),
            dispatcher,
        );

        let roster = self.build_roster(&evaluator);
        for job in &roster {
            self.schedule(job.clone())?;
        }
        if let Ok(mut guard) = self.roster.lock() {
            *guard = roster;
        }

        self.schedule_once(
            self.initial_run(&evaluator),
            Duration::from_secs(self.config.initial_run_delay_secs),
        )?;

        info!("SLA job scheduler started");
        Ok(())
    }

    fn build_roster(&self, evaluator: &SlaEvaluator) -> Vec<JobDefinition> {
        let config = &self.config;

        let breach_evaluator = evaluator.clone();
        let breach_clock = self.clock.clone();
        let breach = JobDefinition::new(
            SLA_BREACH_JOB,
            Duration::from_secs(config.sla_breach_interval_secs),
            Duration::from_secs(config.sla_breach_lock_ttl_secs),
            move || {
                let evaluator = breach_evaluator.clone();
                let now = breach_clock();
                async move {
                    evaluator.check_all_breaches(now).await?;
                    Ok(())
                }
            },
        );

        let warning_evaluator = evaluator.clone();
        let warning_clock = self.clock.clone();
        let warning = JobDefinition::new(
            SLA_WARNING_JOB,
            Duration::from_secs(config.sla_warning_interval_secs),
            Duration::from_secs(config.sla_warning_lock_ttl_secs),
            move || {
                let evaluator = warning_evaluator.clone();
                let now = warning_clock();
                async move {
                    evaluator.check_all_warnings(now).await?;
                    Ok(())
                }
            },
        );

        let store = self.notifications.clone();
        let cleanup_clock = self.clock.clone();
        let retention_days = config.notification_retention_days;
        let cleanup = JobDefinition::new(
            NOTIFICATION_CLEANUP_JOB,
            Duration::from_secs(config.cleanup_interval_secs),
            Duration::from_secs(config.cleanup_lock_ttl_secs),
            move || {
                let store = store.clone();
                let now = cleanup_clock();
                async move {
                    MaintenanceJobs::purge_read_notifications(store.as_ref(), retention_days, now).await?;
                    Ok(())
                }
            },
        );

        vec![breach, warning, cleanup]
    }

    /// Startup burst of breach and warning checks, run by a single instance.
    fn initial_run(&self, evaluator: &SlaEvaluator) -> JobDefinition {
        let evaluator = evaluator.clone();
        let clock = self.clock.clone();
        let ttl = Duration::from_secs(self.config.initial_run_lock_ttl_secs);

        JobDefinition::new(INITIAL_RUN_JOB, ttl, ttl, move || {
            let evaluator = evaluator.clone();
            let now = clock();
            async move {
                evaluator.check_all_breaches(now).await?;
                evaluator.check_all_warnings(now).await?;
                Ok(())
            }
        })
    }

    /// Arms a recurring job. Its first run is one full interval from now.
    pub fn schedule(&self, job: JobDefinition) -> JobResult<()> {
        if self.cancel.is_cancelled() {
            return Err(JobError::Execution("scheduler is stopped".to_string()));
        }

        info!(
            job = %job.name,
            interval_secs = job.interval.as_secs_f64(),
            lock_ttl_secs = job.lock_ttl.as_secs_f64(),
            "Scheduled recurring job"
        );

        let handle = tokio::spawn(run_fixed_delay(
            job,
            self.lock.clone(),
            self.cancel.clone(),
            self.execution_logs.clone(),
        ));
        self.track(handle);
        Ok(())
    }

    /// Arms a job that runs once after `delay`, unless stopped first.
    pub fn schedule_once(&self, job: JobDefinition, delay: Duration) -> JobResult<()> {
        if self.cancel.is_cancelled() {
            return Err(JobError::Execution("scheduler is stopped".to_string()));
        }

        let lock = self.lock.clone();
        let cancel = self.cancel.clone();
        let logs = self.execution_logs.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if !cancel.is_cancelled() {
                execute(&job, &lock, &logs).await;
            }
        });
        self.track(handle);
        Ok(())
    }

    fn track(&self, handle: JoinHandle<()>) {
        match self.handles.lock() {
            Ok(mut handles) => handles.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Cancels every pending wait. Runs already in progress finish on their own.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Stopping SLA job scheduler");
            self.cancel.cancel();
        }
    }

    /// `stop`, then wait for in-flight runs to finish.
    pub async fn shutdown(&self) {
        self.stop();

        let handles: Vec<JoinHandle<()>> = match self.handles.lock() {
            Ok(mut handles) => handles.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Job task ended abnormally: {}", e);
            }
        }

        info!("SLA job scheduler shut down");
    }

    /// Runs a roster job immediately. Skipped when the same job is already in
    /// flight in this process or its lock is held elsewhere.
    pub async fn run_job_now(&self, job_name: &str) -> JobResult<JobStatus> {
        let job = self
            .roster
            .lock()
            .ok()
            .and_then(|roster| roster.iter().find(|job| job.name == job_name).cloned())
            .ok_or_else(|| JobError::UnknownJob(job_name.to_string()))?;

        Ok(execute(&job, &self.lock, &self.execution_logs).await)
    }

    pub fn job_names(&self) -> Vec<String> {
        self.roster
            .lock()
            .map(|roster| roster.iter().map(|job| job.name.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn execution_logs(&self) -> Vec<JobExecutionLog> {
        self.execution_logs.read().await.iter().cloned().collect()
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
