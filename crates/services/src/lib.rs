pub mod activity;
pub mod common;
pub mod context;
pub mod environment;
pub mod organization;
pub mod permissions;
pub mod unit_of_work;

pub use context::RequestContext;
pub use organization::{OrganizationServiceImpl, OrganizationServiceTrait};
pub use permissions::PolicyPermissionChecker;
pub use unit_of_work::{UnitOfWork, UnitOfWorkFactory};

#[cfg(test)]
mod test_utils;
