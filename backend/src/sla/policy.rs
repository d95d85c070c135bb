// SLA policies - per-document time budgets and who answers for them

use chrono::{DateTime, Duration, Utc};
use sentinel_shared::DocumentKind;

/// Role that receives every SLA notification regardless of policy.
pub const ADMIN_ROLE: &str = "admin";

/// Forward window in which a coming deadline raises a warning.
pub fn warning_lookahead() -> Duration {
    Duration::hours(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaMode {
    Breach,
    Warning,
}

impl SlaMode {
    pub fn category(&self) -> &'static str {
        match self {
            SlaMode::Breach => "sla_breach",
            SlaMode::Warning => "sla_warning",
        }
    }

    pub fn push_event(&self) -> &'static str {
        match self {
            SlaMode::Breach => "sla.breach",
            SlaMode::Warning => "sla.warning",
        }
    }
}

/// Persisted marker written when a breach is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreachFlag {
    /// Boolean column set to `true` on breach.
    Breached(&'static str),
    /// Nullable met/not-met column set to `false` on breach.
    Met(&'static str),
}

impl BreachFlag {
    pub fn column(&self) -> &'static str {
        match self {
            BreachFlag::Breached(column) | BreachFlag::Met(column) => column,
        }
    }
}

/// Who, besides administrators, is answerable for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientPolicy {
    Role(&'static str),
    /// Role of the first pending approval step, or `fallback` when none is pending.
    PendingApprover { fallback: &'static str },
}

#[derive(Debug, Clone)]
pub struct SlaPolicy {
    pub kind: DocumentKind,
    pub label_field: &'static str,
    pub explicit_deadline_field: Option<&'static str>,
    pub reference_field: &'static str,
    pub duration: Duration,
    pub qualifying_statuses: &'static [&'static str],
    pub recipients: RecipientPolicy,
    pub breach_flag: Option<BreachFlag>,
}

impl SlaPolicy {
    pub fn for_kind(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::LeaveRequest => Self {
                kind,
                label_field: "reference_no",
                explicit_deadline_field: None,
                reference_field: "submitted_at",
                duration: Duration::hours(48),
                qualifying_statuses: &["pending"],
                recipients: RecipientPolicy::PendingApprover { fallback: "hr_manager" },
                breach_flag: None,
            },
            DocumentKind::PurchaseRequest => Self {
                kind,
                label_field: "reference_no",
                explicit_deadline_field: Some("approval_due_at"),
                reference_field: "submitted_at",
                duration: Duration::hours(72),
                qualifying_statuses: &["pending_approval"],
                recipients: RecipientPolicy::PendingApprover { fallback: "procurement_manager" },
                breach_flag: Some(BreachFlag::Breached("sla_breached")),
            },
            DocumentKind::ServiceTicket => Self {
                kind,
                label_field: "reference_no",
                explicit_deadline_field: Some("response_due_at"),
                reference_field: "created_at",
                duration: Duration::hours(8),
                qualifying_statuses: &["open", "in_progress"],
                recipients: RecipientPolicy::Role("support_agent"),
                breach_flag: Some(BreachFlag::Breached("sla_breached")),
            },
            DocumentKind::DocumentRequest => Self {
                kind,
                label_field: "reference_no",
                explicit_deadline_field: None,
                reference_field: "requested_at",
                duration: Duration::hours(24),
                qualifying_statuses: &["requested", "in_progress"],
                recipients: RecipientPolicy::Role("hr_officer"),
                breach_flag: None,
            },
            DocumentKind::ExpenseClaim => Self {
                kind,
                label_field: "reference_no",
                explicit_deadline_field: None,
                reference_field: "submitted_at",
                duration: Duration::hours(120),
                qualifying_statuses: &["submitted"],
                recipients: RecipientPolicy::PendingApprover { fallback: "finance_officer" },
                breach_flag: Some(BreachFlag::Met("sla_met")),
            },
            DocumentKind::Complaint => Self {
                kind,
                label_field: "reference_no",
                explicit_deadline_field: Some("response_due_at"),
                reference_field: "received_at",
                duration: Duration::hours(72),
                qualifying_statuses: &["open", "under_review"],
                recipients: RecipientPolicy::Role("quality_officer"),
                breach_flag: Some(BreachFlag::Breached("sla_breached")),
            },
            DocumentKind::MaintenanceRequest => Self {
                kind,
                label_field: "reference_no",
                explicit_deadline_field: None,
                reference_field: "reported_at",
                duration: Duration::hours(4),
                qualifying_statuses: &["pending"],
                recipients: RecipientPolicy::Role("facilities_coordinator"),
                breach_flag: None,
            },
        }
    }

    pub fn title(&self, mode: SlaMode) -> String {
        match mode {
            SlaMode::Breach => format!("{} SLA breached", self.kind.display_name()),
            SlaMode::Warning => format!("{} SLA deadline approaching", self.kind.display_name()),
        }
    }

    /// Effective deadline: the explicit one when present, otherwise reference + budget.
    pub fn deadline_for(
        &self,
        explicit_deadline: Option<DateTime<Utc>>,
        reference_at: DateTime<Utc>,
    ) -> DateTime<Utc> {
        explicit_deadline.unwrap_or(reference_at + self.duration)
    }
}
