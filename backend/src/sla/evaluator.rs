// SLA Evaluator - finds documents past or near their deadline and raises alerts

use chrono::{DateTime, Utc};
use sentinel_shared::DocumentKind;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::deadline::due_filters;
use super::policy::{RecipientPolicy, SlaMode, SlaPolicy};
use super::store::{DocumentStore, MonitoredDocument};
use crate::error::StoreResult;
use crate::notifications::{Dispatch, NotificationDispatcher, RecipientResolver};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SlaCheckResult {
    pub documents_checked: usize,
    pub documents_notified: usize,
    pub notifications_sent: usize,
    pub skipped_recent: usize,
    pub flagged: usize,
}

impl SlaCheckResult {
    fn absorb(&mut self, other: SlaCheckResult) {
        self.documents_checked += other.documents_checked;
        self.documents_notified += other.documents_notified;
        self.notifications_sent += other.notifications_sent;
        self.skipped_recent += other.skipped_recent;
        self.flagged += other.flagged;
    }
}

/// Summary pushed to connected clients alongside the stored notifications.
#[derive(Debug, Serialize)]
struct SlaAlert<'a> {
    kind: DocumentKind,
    document_id: Uuid,
    label: &'a str,
    status: &'a str,
    deadline: DateTime<Utc>,
    mode: &'static str,
    minutes: i64,
}

#[derive(Clone)]
pub struct SlaEvaluator {
    documents: Arc<dyn DocumentStore>,
    recipients: RecipientResolver,
    dispatcher: NotificationDispatcher,
}

impl SlaEvaluator {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        recipients: RecipientResolver,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            documents,
            recipients,
            dispatcher,
        }
    }

    /// Breach check over every kind in order. The first failing kind aborts
    /// the rest; the next run starts again from the first kind.
    pub async fn check_all_breaches(&self, now: DateTime<Utc>) -> StoreResult<SlaCheckResult> {
        self.check_all(SlaMode::Breach, now).await
    }

    pub async fn check_all_warnings(&self, now: DateTime<Utc>) -> StoreResult<SlaCheckResult> {
        self.check_all(SlaMode::Warning, now).await
    }

    pub async fn check_breaches(&self, kind: DocumentKind, now: DateTime<Utc>) -> StoreResult<SlaCheckResult> {
        self.evaluate(kind, SlaMode::Breach, now).await
    }

    pub async fn check_warnings(&self, kind: DocumentKind, now: DateTime<Utc>) -> StoreResult<SlaCheckResult> {
        self.evaluate(kind, SlaMode::Warning, now).await
    }

    async fn check_all(&self, mode: SlaMode, now: DateTime<Utc>) -> StoreResult<SlaCheckResult> {
        let mut total = SlaCheckResult::default();

        for kind in DocumentKind::ALL {
            let result = self.evaluate(kind, mode, now).await.inspect_err(|e| {
                warn!(kind = %kind, category = mode.category(), "SLA check aborted: {}", e);
            })?;
            total.absorb(result);
        }

        info!(
            category = mode.category(),
            checked = total.documents_checked,
            notified = total.documents_notified,
            sent = total.notifications_sent,
            "SLA check completed"
        );

        Ok(total)
    }

    /// Union of the explicit-deadline and computed-deadline result sets.
    pub async fn find_due(
        &self,
        policy: &SlaPolicy,
        mode: SlaMode,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<MonitoredDocument>> {
        let mut seen = HashSet::new();
        let mut due = Vec::new();

        for filter in due_filters(policy, mode, now) {
            for document in self.documents.find_due(&filter).await? {
                if seen.insert(document.id) {
                    due.push(document);
                }
            }
        }

        Ok(due)
    }

    async fn evaluate(&self, kind: DocumentKind, mode: SlaMode, now: DateTime<Utc>) -> StoreResult<SlaCheckResult> {
        let policy = SlaPolicy::for_kind(kind);
        let title = policy.title(mode);
        let mut result = SlaCheckResult::default();

        for document in self.find_due(&policy, mode, now).await? {
            result.documents_checked += 1;

            if self
                .dispatcher
                .has_recent_notification(kind.table(), document.id, &title, now)
                .await?
            {
                result.skipped_recent += 1;
                // A previous run may have notified but died before writing the flag.
                if mode == SlaMode::Breach {
                    result.flagged += self.write_breach_flag(&policy, document.id).await?;
                }
                continue;
            }

            let role = self.responsible_role(&policy, &document).await?;
            let recipients = self.recipients.resolve(&role).await?;

            let deadline = policy.deadline_for(document.explicit_deadline, document.reference_at);
            let (body, minutes, mode_name) = match mode {
                SlaMode::Breach => {
                    let overdue = (now - deadline).num_minutes();
                    (
                        format!(
                            "{} {} is overdue by {}",
                            kind.display_name(),
                            document.label,
                            format_duration(overdue)
                        ),
                        overdue,
                        "breach",
                    )
                }
                SlaMode::Warning => {
                    let remaining = (deadline - now).num_minutes();
                    (
                        format!(
                            "{} {} is due in {}",
                            kind.display_name(),
                            document.label,
                            format_duration(remaining)
                        ),
                        remaining,
                        "warning",
                    )
                }
            };

            let payload = serde_json::to_value(SlaAlert {
                kind,
                document_id: document.id,
                label: &document.label,
                status: &document.status,
                deadline,
                mode: mode_name,
                minutes,
            })?;

            let sent = self
                .dispatcher
                .dispatch(Dispatch {
                    recipients,
                    title: title.clone(),
                    body,
                    category: mode.category().to_string(),
                    reference_table: kind.table().to_string(),
                    reference_id: document.id,
                    push_event: mode.push_event().to_string(),
                    push_roles: vec![role],
                    payload,
                })
                .await?;

            result.documents_notified += 1;
            result.notifications_sent += sent;

            if mode == SlaMode::Breach {
                result.flagged += self.write_breach_flag(&policy, document.id).await?;
            }
        }

        if result.documents_notified > 0 {
            info!(
                kind = %kind,
                category = mode.category(),
                notified = result.documents_notified,
                sent = result.notifications_sent,
                "Raised SLA notifications"
            );
        }

        Ok(result)
    }

    async fn write_breach_flag(&self, policy: &SlaPolicy, id: Uuid) -> StoreResult<usize> {
        match policy.breach_flag {
            Some(flag) => {
                self.documents.mark_breached(policy.kind, flag, id).await?;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn responsible_role(&self, policy: &SlaPolicy, document: &MonitoredDocument) -> StoreResult<String> {
        match policy.recipients {
            RecipientPolicy::Role(role) => Ok(role.to_string()),
            RecipientPolicy::PendingApprover { fallback } => Ok(self
                .documents
                .pending_approver_role(policy.kind, document.id)
                .await?
                .unwrap_or_else(|| fallback.to_string())),
        }
    }
}

pub fn format_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes < 60 {
        format!("{} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else if minutes < 1440 {
        let hours = minutes / 60;
        let mins = minutes % 60;
        if mins > 0 {
            format!("{}h {}m", hours, mins)
        } else {
            format!("{} hour{}", hours, if hours == 1 { "" } else { "s" })
        }
    } else {
        let days = minutes / 1440;
        let hours = (minutes % 1440) / 60;
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{} day{}", days, if days == 1 { "" } else { "s" })
        }
    }
}
