// Several scheduler instances sharing one lock store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::jobs::lock::MockLockStore;
use crate::jobs::{
    Clock, JobConfig, JobDefinition, JobScheduler, JobStatus, LockCoordinator, LockError, LockStore, SLA_BREACH_JOB,
};
use crate::notifications::PushChannel;
use crate::tests::fixtures::{hours, t0, DocumentFixture, Harness, MemoryLockStore};
use sentinel_shared::DocumentKind;

/// One instance with the given lock store, running a job that bumps `runs`.
fn instance(store: Option<Arc<dyn LockStore>>, holder: &str, runs: Arc<AtomicUsize>) -> JobScheduler {
    let harness = Harness::new();
    let scheduler = JobScheduler::new(
        JobConfig::default(),
        LockCoordinator::new(store, holder),
        harness.documents.clone(),
        harness.notifications.clone(),
        harness.directory.clone(),
    );

    let job = JobDefinition::new(SLA_BREACH_JOB, Duration::from_secs(10), Duration::from_secs(9), move || {
        let runs = runs.clone();
        async move {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    });
    scheduler.schedule(job).unwrap();
    scheduler
}

async fn count_status(scheduler: &JobScheduler, status: JobStatus) -> usize {
    scheduler
        .execution_logs()
        .await
        .iter()
        .filter(|log| log.status == status)
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_shared_lock_runs_each_tick_once() {
    let store: Arc<dyn LockStore> = Arc::new(MemoryLockStore::default());
    let runs = Arc::new(AtomicUsize::new(0));
    let a = instance(Some(store.clone()), "instance-a", runs.clone());
    let b = instance(Some(store), "instance-b", runs.clone());

    sleep(Duration::from_secs(55)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 5);
    let completed = count_status(&a, JobStatus::Completed).await + count_status(&b, JobStatus::Completed).await;
    let skipped = count_status(&a, JobStatus::Skipped).await + count_status(&b, JobStatus::Skipped).await;
    assert_eq!(completed, 5);
    assert_eq!(skipped, 5);
}

#[tokio::test(start_paused = true)]
async fn test_without_lock_store_every_instance_runs() {
    let runs = Arc::new(AtomicUsize::new(0));
    let _a = instance(None, "instance-a", runs.clone());
    let _b = instance(None, "instance-b", runs.clone());

    sleep(Duration::from_secs(55)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 10);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_lock_store_fails_open() {
    let mut mock = MockLockStore::new();
    mock.expect_set_if_absent()
        .returning(|_, _, _| Err(LockError::Unavailable("connection reset".to_string())));
    let store: Arc<dyn LockStore> = Arc::new(mock);

    let runs = Arc::new(AtomicUsize::new(0));
    let _a = instance(Some(store.clone()), "instance-a", runs.clone());
    let _b = instance(Some(store), "instance-b", runs.clone());

    sleep(Duration::from_secs(55)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn test_fleet_notifies_breach_once() {
    let harness = Harness::new();
    let id = harness
        .documents
        .insert(DocumentFixture::new(DocumentKind::ServiceTicket, t0() - hours(9)));
    let now = harness.at(t0());
    let clock: Clock = Arc::new(move || now);

    let store: Arc<dyn LockStore> = Arc::new(MemoryLockStore::default());
    let fleet: Vec<JobScheduler> = ["instance-a", "instance-b", "instance-c"]
        .into_iter()
        .map(|holder| {
            JobScheduler::new(
                JobConfig::default(),
                LockCoordinator::new(Some(store.clone()), holder),
                harness.documents.clone(),
                harness.notifications.clone(),
                harness.directory.clone(),
            )
            .with_clock(clock.clone())
        })
        .collect();

    for scheduler in &fleet {
        let push: Arc<dyn PushChannel> = harness.push.clone();
        scheduler.start(Some(push)).unwrap();
    }

    let mut statuses = Vec::new();
    for scheduler in &fleet {
        statuses.push(scheduler.run_job_now(SLA_BREACH_JOB).await.unwrap());
    }

    assert_eq!(statuses, vec![JobStatus::Completed, JobStatus::Skipped, JobStatus::Skipped]);
    assert_eq!(harness.notifications.for_document(id).len(), harness.admins.len());
    assert_eq!(harness.push.events().len(), 1);
    assert_eq!(harness.documents.flag_of(id), Some(true));

    for scheduler in &fleet {
        scheduler.shutdown().await;
    }
}
