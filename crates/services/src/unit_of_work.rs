use async_trait::async_trait;

use crate::activity::ActivityLog;
use crate::common::RepositoryError;
use crate::environment::EnvironmentStore;
use crate::organization::OrganizationStore;
use crate::permissions::ResourcePolicyStore;

/// A single database transaction spanning every store a service call touches.
///
/// Nothing written through a unit of work is visible to other callers until
/// [`UnitOfWork::commit`] succeeds. Dropping it without committing rolls back.
#[async_trait]
pub trait UnitOfWork:
    OrganizationStore + EnvironmentStore + ResourcePolicyStore + ActivityLog + Send
{
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Opens units of work (one per service call)
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}
