// Notifications - persistence, recipient resolution and fan-out for SLA alerts

pub mod dispatcher;
pub mod recipients;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_shared::{NewNotification, Notification};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreResult;

pub use dispatcher::{Dispatch, NotificationDispatcher, PushChannel, DEDUP_WINDOW_MINUTES};
pub use recipients::{PgRoleDirectory, RecipientResolver, RoleDirectory};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create(&self, notification: NewNotification) -> StoreResult<Notification>;

    /// Whether a notification for `table`/`id` whose title contains
    /// `title_fragment` was created strictly after `since`.
    async fn has_recent(
        &self,
        table: &str,
        id: Uuid,
        title_fragment: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Deletes read notifications created before `cutoff`.
    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    db_pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn create(&self, notification: NewNotification) -> StoreResult<Notification> {
        let created = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                id, recipient_id, title, body, category,
                reference_table, reference_id, read, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, false, NOW())
            RETURNING id, recipient_id, title, body, category,
                      reference_table, reference_id, read, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(notification.recipient_id)
        .bind(notification.title)
        .bind(notification.body)
        .bind(notification.category)
        .bind(notification.reference_table)
        .bind(notification.reference_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(created)
    }

    async fn has_recent(
        &self,
        table: &str,
        id: Uuid,
        title_fragment: &str,
        since: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM notifications
                WHERE reference_table = $1
                  AND reference_id = $2
                  AND strpos(title, $3) > 0
                  AND created_at > $4
            )
            "#,
        )
        .bind(table)
        .bind(id)
        .bind(title_fragment)
        .bind(since)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(exists)
    }

    async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE read = true AND created_at < $1")
            .bind(cutoff)
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected())
    }
}
