// Maintenance Jobs - housekeeping that runs on the same scheduler as the SLA checks

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::error::StoreResult;
use crate::notifications::NotificationStore;

pub struct MaintenanceJobs;

impl MaintenanceJobs {
    /// Delete read notifications older than the retention period.
    ///
    /// Unread ones are kept regardless of age, and anything inside the dedup
    /// window is far younger than any sane retention.
    pub async fn purge_read_notifications(
        store: &dyn NotificationStore,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let cutoff = now - Duration::days(retention_days);
        let deleted = store.purge_read_before(cutoff).await?;

        info!("Purged {} read notifications older than {} days", deleted, retention_days);

        Ok(deleted)
    }
}
