// Notification dispatcher - windowed dedup, persistence and role broadcasts

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sentinel_shared::NewNotification;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::NotificationStore;
use crate::error::StoreResult;

/// Trailing window in which an existing notification suppresses a new one.
pub const DEDUP_WINDOW_MINUTES: i64 = 60;

/// Real-time channel to connected clients.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Returns how many live connections received the event.
    async fn broadcast_to_role(&self, role: &str, event: &str, payload: serde_json::Value) -> usize;
}

#[derive(Debug, Clone)]
pub struct Dispatch {
    pub recipients: Vec<Uuid>,
    pub title: String,
    pub body: String,
    pub category: String,
    pub reference_table: String,
    pub reference_id: Uuid,
    pub push_event: String,
    pub push_roles: Vec<String>,
    pub payload: serde_json::Value,
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    push: Option<Arc<dyn PushChannel>>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, push: Option<Arc<dyn PushChannel>>) -> Self {
        Self { store, push }
    }

    pub async fn has_recent_notification(
        &self,
        table: &str,
        id: Uuid,
        title_fragment: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let since = now - Duration::minutes(DEDUP_WINDOW_MINUTES);
        self.store.has_recent(table, id, title_fragment, since).await
    }

    /// Persists one notification per recipient, then broadcasts once per push
    /// role. With no recipients nothing fires. Returns the number of
    /// notifications written.
    pub async fn dispatch(&self, dispatch: Dispatch) -> StoreResult<usize> {
        if dispatch.recipients.is_empty() {
            debug!(
                table = %dispatch.reference_table,
                id = %dispatch.reference_id,
                "No recipients, nothing dispatched"
            );
            return Ok(0);
        }

        let mut created = 0;
        for recipient_id in &dispatch.recipients {
            self.store
                .create(NewNotification {
                    recipient_id: *recipient_id,
                    title: dispatch.title.clone(),
                    body: dispatch.body.clone(),
                    category: dispatch.category.clone(),
                    reference_table: Some(dispatch.reference_table.clone()),
                    reference_id: Some(dispatch.reference_id),
                })
                .await?;
            created += 1;
        }

        if let Some(push) = &self.push {
            for role in &dispatch.push_roles {
                let reached = push
                    .broadcast_to_role(role, &dispatch.push_event, dispatch.payload.clone())
                    .await;
                debug!(
                    role = %role,
                    event = %dispatch.push_event,
                    reached,
                    "Broadcast SLA event"
                );
            }
        }

        Ok(created)
    }
}
