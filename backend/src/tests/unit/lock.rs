// Unit tests for the lock coordinator

use mockall::predicate::eq;
use std::sync::Arc;
use std::time::Duration;

use crate::jobs::lock::MockLockStore;
use crate::jobs::{lock_key, LockCoordinator, LockError, LockStore};
use crate::tests::fixtures::MemoryLockStore;

#[test]
fn test_lock_key_format() {
    assert_eq!(lock_key("sla_breach_check"), "lock:sla_breach_check");
}

#[tokio::test]
async fn test_without_store_always_grants() {
    let coordinator = LockCoordinator::new(None, "instance-a");

    for _ in 0..3 {
        assert!(coordinator.acquire("sla_breach_check", Duration::from_secs(60)).await);
    }
}

#[tokio::test]
async fn test_sets_prefixed_key_with_holder_and_ttl() {
    let mut store = MockLockStore::new();
    store
        .expect_set_if_absent()
        .with(
            eq("lock:sla_warning_check"),
            eq("instance-a"),
            eq(Duration::from_secs(840)),
        )
        .times(1)
        .returning(|_, _, _| Ok(true));

    let coordinator = LockCoordinator::new(Some(Arc::new(store)), "instance-a");
    assert!(coordinator.acquire("sla_warning_check", Duration::from_secs(840)).await);
}

#[tokio::test]
async fn test_live_key_denies() {
    let mut store = MockLockStore::new();
    store.expect_set_if_absent().returning(|_, _, _| Ok(false));

    let coordinator = LockCoordinator::new(Some(Arc::new(store)), "instance-b");
    assert!(!coordinator.acquire("sla_breach_check", Duration::from_secs(240)).await);
}

#[tokio::test]
async fn test_store_failure_fails_open() {
    let mut store = MockLockStore::new();
    store
        .expect_set_if_absent()
        .times(2)
        .returning(|_, _, _| Err(LockError::Unavailable("connection refused".to_string())));

    let coordinator = LockCoordinator::new(Some(Arc::new(store)), "instance-a");
    assert!(coordinator.acquire("sla_breach_check", Duration::from_secs(240)).await);
    assert!(coordinator.acquire("sla_breach_check", Duration::from_secs(240)).await);
}

#[tokio::test(start_paused = true)]
async fn test_lock_reclaimed_only_after_ttl() {
    let store = Arc::new(MemoryLockStore::default());
    let shared: Arc<dyn LockStore> = store.clone();
    let a = LockCoordinator::new(Some(shared.clone()), "instance-a");
    let b = LockCoordinator::new(Some(shared), "instance-b");
    let ttl = Duration::from_secs(240);

    assert!(a.acquire("sla_breach_check", ttl).await);
    assert!(!b.acquire("sla_breach_check", ttl).await);
    assert_eq!(store.holder_of("lock:sla_breach_check").as_deref(), Some("instance-a"));

    tokio::time::advance(Duration::from_secs(239)).await;
    assert!(!b.acquire("sla_breach_check", ttl).await);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(b.acquire("sla_breach_check", ttl).await);
    assert_eq!(store.holder_of("lock:sla_breach_check").as_deref(), Some("instance-b"));
}

#[tokio::test(start_paused = true)]
async fn test_locks_are_per_job() {
    let store: Arc<dyn LockStore> = Arc::new(MemoryLockStore::default());
    let a = LockCoordinator::new(Some(store.clone()), "instance-a");
    let b = LockCoordinator::new(Some(store), "instance-b");

    assert!(a.acquire("sla_breach_check", Duration::from_secs(60)).await);
    assert!(b.acquire("sla_warning_check", Duration::from_secs(60)).await);
}
