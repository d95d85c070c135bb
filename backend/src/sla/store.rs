// Document store - read/flag access to the monitored business documents

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sentinel_shared::DocumentKind;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::deadline::{DeadlinePath, DueFilter, Window};
use super::policy::{BreachFlag, SlaPolicy};
use crate::error::StoreResult;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredDocument {
    pub kind: DocumentKind,
    pub id: Uuid,
    pub label: String,
    pub status: String,
    pub explicit_deadline: Option<DateTime<Utc>>,
    pub reference_at: DateTime<Utc>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_due(&self, filter: &DueFilter) -> StoreResult<Vec<MonitoredDocument>>;

    async fn mark_breached(&self, kind: DocumentKind, flag: BreachFlag, id: Uuid) -> StoreResult<()>;

    /// Approver role of the earliest still-pending workflow step, if any.
    async fn pending_approver_role(&self, kind: DocumentKind, id: Uuid) -> StoreResult<Option<String>>;
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    label: String,
    status: String,
    explicit_deadline: Option<DateTime<Utc>>,
    reference_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    db_pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

/// Renders the SELECT for one filter. Column and table names come from the
/// static policy table, never from input, so interpolation is safe here.
fn due_query(policy: &SlaPolicy, filter: &DueFilter) -> Option<String> {
    let table = policy.kind.table();
    let explicit_select = policy.explicit_deadline_field.unwrap_or("NULL::timestamptz");

    let mut sql = format!(
        "SELECT id, {label}::text AS label, status, {explicit} AS explicit_deadline, \
         {reference} AS reference_at FROM {table} WHERE status = ANY($1)",
        label = policy.label_field,
        explicit = explicit_select,
        reference = policy.reference_field,
    );

    let column = match filter.path {
        DeadlinePath::Explicit => {
            let field = policy.explicit_deadline_field?;
            sql.push_str(&format!(" AND {field} IS NOT NULL"));
            field
        }
        DeadlinePath::Computed => {
            if let Some(field) = policy.explicit_deadline_field {
                sql.push_str(&format!(" AND {field} IS NULL"));
            }
            policy.reference_field
        }
    };

    match filter.window {
        Window::Before(_) => sql.push_str(&format!(" AND {column} < $2")),
        Window::Between(_, _) => sql.push_str(&format!(" AND {column} >= $2 AND {column} <= $3")),
    }

    match filter.exclude_flagged {
        Some(BreachFlag::Breached(flag)) => sql.push_str(&format!(" AND {flag} IS NOT TRUE")),
        Some(BreachFlag::Met(flag)) => sql.push_str(&format!(" AND {flag} IS DISTINCT FROM FALSE")),
        None => {}
    }

    sql.push_str(&format!(" ORDER BY {column} ASC"));
    Some(sql)
}

/// Touches only the flag column; monitored tables share no other writable column.
fn flag_update(kind: DocumentKind, flag: BreachFlag) -> String {
    let value = match flag {
        BreachFlag::Breached(_) => "TRUE",
        BreachFlag::Met(_) => "FALSE",
    };
    format!("UPDATE {} SET {} = {} WHERE id = $1", kind.table(), flag.column(), value)
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find_due(&self, filter: &DueFilter) -> StoreResult<Vec<MonitoredDocument>> {
        let policy = SlaPolicy::for_kind(filter.kind);
        let Some(sql) = due_query(&policy, filter) else {
            return Ok(Vec::new());
        };

        let statuses: Vec<String> = filter.statuses.iter().map(|s| s.to_string()).collect();
        let query = sqlx::query_as::<_, DocumentRow>(&sql).bind(statuses);
        let query = match filter.window {
            Window::Before(end) => query.bind(end),
            Window::Between(start, end) => query.bind(start).bind(end),
        };

        let rows = query.fetch_all(&self.db_pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| MonitoredDocument {
                kind: filter.kind,
                id: row.id,
                label: row.label,
                status: row.status,
                explicit_deadline: row.explicit_deadline,
                reference_at: row.reference_at,
            })
            .collect())
    }

    async fn mark_breached(&self, kind: DocumentKind, flag: BreachFlag, id: Uuid) -> StoreResult<()> {
        sqlx::query(&flag_update(kind, flag))
            .bind(id)
            .execute(&self.db_pool)
            .await?;
        Ok(())
    }

    async fn pending_approver_role(&self, kind: DocumentKind, id: Uuid) -> StoreResult<Option<String>> {
        let role = sqlx::query_scalar::<_, String>(
            r#"
            SELECT approver_role FROM approval_steps
            WHERE document_table = $1 AND document_id = $2 AND status = 'pending'
            ORDER BY step_order ASC
            LIMIT 1
            "#,
        )
        .bind(kind.table())
        .bind(id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(role)
    }
}
