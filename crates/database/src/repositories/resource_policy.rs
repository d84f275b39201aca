use crate::pool::DbPool;
use crate::repositories::unit_of_work::PgUnitOfWork;
use crate::repositories::utils::{map_db_error, map_pool_error, parse_permissions, permission_names};
use crate::retry_db;
use async_trait::async_trait;
use services::common::RepositoryError;
use services::permissions::{Permission, ResourcePolicyRepository, ResourcePolicyStore};
use tracing::debug;

#[async_trait]
impl ResourcePolicyStore for PgUnitOfWork {
    async fn attach_resource_policy(
        &mut self,
        group: &str,
        permissions: &[Permission],
        resource_uri: &str,
        resource_type: &str,
    ) -> Result<(), RepositoryError> {
        let names = permission_names(permissions);
        self.client()?
            .execute(
                r#"
                INSERT INTO resource_policies (group_uri, resource_uri, resource_type, permissions)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (group_uri, resource_uri, resource_type)
                DO UPDATE SET permissions = EXCLUDED.permissions, updated = NOW()
                "#,
                &[&group, &resource_uri, &resource_type, &names],
            )
            .await
            .map_err(map_db_error)?;

        debug!(group, resource_uri, resource_type, "Attached resource policy");
        Ok(())
    }

    async fn delete_resource_policy(
        &mut self,
        group: &str,
        resource_uri: &str,
        resource_type: &str,
    ) -> Result<(), RepositoryError> {
        let rows_affected = self
            .client()?
            .execute(
                "DELETE FROM resource_policies \
                 WHERE group_uri = $1 AND resource_uri = $2 AND resource_type = $3",
                &[&group, &resource_uri, &resource_type],
            )
            .await
            .map_err(map_db_error)?;

        debug!(group, resource_uri, rows_affected, "Deleted resource policy");
        Ok(())
    }
}

/// Committed resource policies, read by the resource guard outside any unit of work
pub struct PgResourcePolicyRepository {
    pool: DbPool,
}

impl PgResourcePolicyRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResourcePolicyRepository for PgResourcePolicyRepository {
    async fn find_permissions(
        &self,
        groups: &[String],
        resource_uri: &str,
    ) -> Result<Vec<Permission>, RepositoryError> {
        let rows = retry_db!("find_resource_permissions", {
            let client = self.pool.get().await.map_err(map_pool_error)?;

            client
                .query(
                    "SELECT permissions FROM resource_policies \
                     WHERE resource_uri = $1 AND group_uri = ANY($2)",
                    &[&resource_uri, &groups],
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
