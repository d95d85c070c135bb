// Recipient resolution - administrators plus whoever holds the responsible role

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::sla::policy::ADMIN_ROLE;

#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Active employees holding `role`.
    async fn members_with_role(&self, role: &str) -> StoreResult<Vec<Uuid>>;

    async fn roles_of(&self, employee_id: Uuid) -> StoreResult<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct PgRoleDirectory {
    db_pool: PgPool,
}

impl PgRoleDirectory {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RoleDirectory for PgRoleDirectory {
    async fn members_with_role(&self, role: &str) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT e.id FROM employees e
            JOIN employee_roles er ON er.employee_id = e.id
            WHERE er.role = $1 AND e.is_active = true
            ORDER BY e.id
            "#,
        )
        .bind(role)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(ids)
    }

    async fn roles_of(&self, employee_id: Uuid) -> StoreResult<Vec<String>> {
        let roles = sqlx::query_scalar::<_, String>(
            r#"
            SELECT er.role FROM employee_roles er
            JOIN employees e ON er.employee_id = e.id
            WHERE er.employee_id = $1 AND e.is_active = true
            "#,
        )
        .bind(employee_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(roles)
    }
}

/// Single place where administrators are folded into every recipient set.
#[derive(Clone)]
pub struct RecipientResolver {
    directory: Arc<dyn RoleDirectory>,
}

impl RecipientResolver {
    pub fn new(directory: Arc<dyn RoleDirectory>) -> Self {
        Self { directory }
    }

    /// Admins first, then members of `role`, without duplicates.
    /// Looked up fresh on every call.
    pub async fn resolve(&self, role: &str) -> StoreResult<Vec<Uuid>> {
        let mut recipients = self.directory.members_with_role(ADMIN_ROLE).await?;

        if role != ADMIN_ROLE {
            for id in self.directory.members_with_role(role).await? {
                if !recipients.contains(&id) {
                    recipients.push(id);
                }
            }
        }

        Ok(recipients)
    }
}
