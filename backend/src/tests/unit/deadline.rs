// Unit tests for deadline resolution and SLA policies

use chrono::Duration;
use sentinel_shared::DocumentKind;

use crate::sla::{
    due_filters, format_duration, BreachFlag, DeadlinePath, RecipientPolicy, SlaMode, SlaPolicy, Window,
};
use crate::tests::fixtures::{hours, t0, DocumentFixture, Harness};

#[test]
fn test_window_bounds() {
    let now = t0();

    let before = Window::Before(now);
    assert!(before.contains(now - Duration::seconds(1)));
    assert!(!before.contains(now));

    let between = Window::Between(now, now + hours(1));
    assert!(between.contains(now));
    assert!(between.contains(now + hours(1)));
    assert!(!between.contains(now + hours(1) + Duration::seconds(1)));
    assert!(!between.contains(now - Duration::seconds(1)));
}

#[test]
fn test_breach_filters_for_kind_with_explicit_field() {
    let now = t0();
    let policy = SlaPolicy::for_kind(DocumentKind::PurchaseRequest);
    let filters = due_filters(&policy, SlaMode::Breach, now);

    assert_eq!(filters.len(), 2);
    assert_eq!(filters[0].path, DeadlinePath::Explicit);
    assert_eq!(filters[0].window, Window::Before(now));
    assert_eq!(filters[1].path, DeadlinePath::Computed);
    assert_eq!(filters[1].window, Window::Before(now - hours(72)));
    assert!(filters
        .iter()
        .all(|f| f.exclude_flagged == Some(BreachFlag::Breached("sla_breached"))));
}

#[test]
fn test_warning_filters_shift_lookahead_by_duration() {
    let now = t0();
    let policy = SlaPolicy::for_kind(DocumentKind::MaintenanceRequest);
    let filters = due_filters(&policy, SlaMode::Warning, now);

    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].path, DeadlinePath::Computed);
    assert_eq!(
        filters[0].window,
        Window::Between(now - hours(4), now + hours(1) - hours(4))
    );
    assert_eq!(filters[0].exclude_flagged, None);
}

#[test]
fn test_every_kind_has_a_complete_policy() {
    for kind in DocumentKind::ALL {
        let policy = SlaPolicy::for_kind(kind);
        assert_eq!(policy.kind, kind);
        assert!(!policy.qualifying_statuses.is_empty());
        assert!(policy.duration > Duration::zero());
        assert!(policy.title(SlaMode::Breach).contains("SLA breached"));
        assert_ne!(policy.title(SlaMode::Breach), policy.title(SlaMode::Warning));
        match policy.recipients {
            RecipientPolicy::Role(role) | RecipientPolicy::PendingApprover { fallback: role } => {
                assert!(!role.is_empty())
            }
        }
    }
}

#[test]
fn test_deadline_prefers_explicit_field() {
    let policy = SlaPolicy::for_kind(DocumentKind::ServiceTicket);
    let reference = t0();

    assert_eq!(policy.deadline_for(None, reference), reference + hours(8));
    assert_eq!(
        policy.deadline_for(Some(reference + hours(2)), reference),
        reference + hours(2)
    );
}

#[test]
fn test_format_duration() {
    assert_eq!(format_duration(1), "1 minute");
    assert_eq!(format_duration(45), "45 minutes");
    assert_eq!(format_duration(60), "1 hour");
    assert_eq!(format_duration(125), "2h 5m");
    assert_eq!(format_duration(1440), "1 day");
    assert_eq!(format_duration(3 * 1440 + 240), "3d 4h");
    assert_eq!(format_duration(-5), "0 minutes");
}

#[tokio::test]
async fn test_explicit_and_computed_deadlines_agree() {
    let harness = Harness::new();
    let policy = SlaPolicy::for_kind(DocumentKind::ServiceTicket);
    let deadline = t0() + hours(10);

    let explicit = harness
        .documents
        .insert(DocumentFixture::new(DocumentKind::ServiceTicket, t0()).with_deadline(deadline));
    let computed = harness
        .documents
        .insert(DocumentFixture::new(DocumentKind::ServiceTicket, deadline - policy.duration));

    let ids_at = |docs: Vec<crate::sla::MonitoredDocument>| {
        let mut ids: Vec<_> = docs.into_iter().map(|d| d.id).collect();
        ids.sort();
        ids
    };
    let mut both = vec![explicit, computed];
    both.sort();

    for (offset, expected) in [
        (Duration::seconds(-1), vec![]),
        (Duration::zero(), vec![]),
        (Duration::seconds(1), both.clone()),
        (hours(3), both.clone()),
    ] {
        let now = deadline + offset;
        let due = harness
            .evaluator
            .find_due(&policy, SlaMode::Breach, now)
            .await
            .unwrap();
        assert_eq!(ids_at(due), expected, "breach at deadline offset {}", offset);
    }

    // Both enter the warning window together too.
    let due = harness
        .evaluator
        .find_due(&policy, SlaMode::Warning, deadline - Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(ids_at(due), both);

    let due = harness
        .evaluator
        .find_due(&policy, SlaMode::Warning, deadline - hours(2))
        .await
        .unwrap();
    assert!(due.is_empty());
}

#[tokio::test]
async fn test_explicit_deadline_overrides_reference() {
    let harness = Harness::new();
    let policy = SlaPolicy::for_kind(DocumentKind::Complaint);

    // Reference is long past the 72h budget, but the explicit deadline is later.
    harness.documents.insert(
        DocumentFixture::new(DocumentKind::Complaint, t0() - hours(100)).with_deadline(t0() + hours(5)),
    );

    let due = harness
        .evaluator
        .find_due(&policy, SlaMode::Breach, t0())
        .await
        .unwrap();
    assert!(due.is_empty());
}

#[tokio::test]
async fn test_non_qualifying_status_is_ignored() {
    let harness = Harness::new();
    let policy = SlaPolicy::for_kind(DocumentKind::LeaveRequest);

    harness
        .documents
        .insert(DocumentFixture::new(DocumentKind::LeaveRequest, t0() - hours(100)).with_status("approved"));

    let due = harness
        .evaluator
        .find_due(&policy, SlaMode::Breach, t0())
        .await
        .unwrap();
    assert!(due.is_empty());
}
