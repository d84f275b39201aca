use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, map_pool_error, parse_permissions, permission_names};
use crate::retry_db;
use async_trait::async_trait;
use services::common::RepositoryError;
use services::permissions::{Permission, TenantPolicyRepository};
use tracing::info;

/// Tenant-wide permissions per group
pub struct PgTenantPolicyRepository {
    pool: DbPool,
}

impl PgTenantPolicyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Grant `permissions` to `group`, replacing any earlier grant
    pub async fn grant(
        &self,
        group: &str,
        permissions: &[Permission],
    ) -> Result<(), RepositoryError> {
        let names = permission_names(permissions);

        retry_db!("grant_tenant_permissions", {
            let client = self.pool.get().await.map_err(map_pool_error)?;

            client
                .execute(
                    r#"
                    INSERT INTO tenant_policies (group_uri, permissions)
                    VALUES ($1, $2)
                    ON CONFLICT (group_uri) DO UPDATE SET permissions = EXCLUDED.permissions
                    "#,
                    &[&group, &names],
                )
                .await
                .map_err(map_db_error)
        })?;

        info!(group, permissions = ?names, "Granted tenant permissions");
        Ok(())
    }
}

#[async_trait]
impl TenantPolicyRepository for PgTenantPolicyRepository {
    async fn find_permissions(&self, groups: &[String]) -> Result<Vec<Permission>, RepositoryError> {
        let rows = retry_db!("find_tenant_permissions", {
            let client = self.pool.get().await.map_err(map_pool_error)?;

            client
                .query(
                    "SELECT permissions FROM tenant_policies WHERE group_uri = ANY($1)",
                    &[&groups],
                )
                .await
                .map_err(map_db_error)
        })?;

        let mut permissions = Vec::new();
        for row in rows {
            permissions.extend(parse_permissions(row.get("permissions"))?);
        }
        permissions.sort();
        permissions.dedup();
        Ok(permissions)
    }
}
