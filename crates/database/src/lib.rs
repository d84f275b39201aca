pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, DbPool};
pub use repositories::{
    PgResourcePolicyRepository, PgTenantPolicyRepository, PgUnitOfWork, PgUnitOfWorkFactory,
};

use anyhow::Result;
use services::common::Pagination;
use services::organization::OrganizationServiceImpl;
use services::permissions::PolicyPermissionChecker;
use std::sync::Arc;

/// Database service combining the unit-of-work factory and the policy repositories
pub struct Database {
    pub unit_of_work: Arc<PgUnitOfWorkFactory>,
    pub resource_policies: Arc<PgResourcePolicyRepository>,
    pub tenant_policies: Arc<PgTenantPolicyRepository>,
    pool: DbPool,
}

impl Database {
    /// Create a new database service from a connection pool
    pub fn new(pool: DbPool) -> Self {
        Self {
            unit_of_work: Arc::new(PgUnitOfWorkFactory::new(pool.clone())),
            resource_policies: Arc::new(PgResourcePolicyRepository::new(pool.clone())),
            tenant_policies: Arc::new(PgTenantPolicyRepository::new(pool.clone())),
            pool,
        }
    }

    /// Create a new database service from configuration
    pub async fn from_config(config: &config::DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self::new(pool))
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Organization service backed by this database
    pub fn organization_service(
        &self,
        config: &config::PermissionsConfig,
    ) -> OrganizationServiceImpl {
        let checker = PolicyPermissionChecker::from_config(
            self.tenant_policies.clone(),
            self.resource_policies.clone(),
            config,
        );

        OrganizationServiceImpl::new(
            self.unit_of_work.clone(),
            Arc::new(checker),
            Pagination::from(config),
        )
    }
}
