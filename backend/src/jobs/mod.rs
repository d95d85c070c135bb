// Background Jobs
//
// Recurring SLA checks and maintenance run as fixed-delay tasks, one per job,
// each tick gated by a TTL lock so a fleet of instances does the work once.

pub mod lock;
pub mod maintenance;
pub mod scheduler;

pub use lock::{lock_key, LockCoordinator, LockError, LockStore, RedisLockStore};
pub use maintenance::MaintenanceJobs;
pub use scheduler::{
    Clock, JobAction, JobConfig, JobDefinition, JobError, JobExecutionLog, JobResult, JobScheduler, JobStatus,
    INITIAL_RUN_JOB, NOTIFICATION_CLEANUP_JOB, SLA_BREACH_JOB, SLA_WARNING_JOB,
};
