pub mod activity;
pub mod environment;
pub mod organization;
pub mod resource_policy;
pub mod retry;
pub mod tenant_policy;
pub mod unit_of_work;
pub mod utils;

pub use resource_policy::PgResourcePolicyRepository;
pub use tenant_policy::PgTenantPolicyRepository;
pub use unit_of_work::{PgUnitOfWork, PgUnitOfWorkFactory};
