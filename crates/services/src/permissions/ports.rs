use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::RepositoryError;
use crate::context::RequestContext;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// Named permissions, stored by their `SCREAMING_SNAKE_CASE` name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    // Tenant level
    ManageOrganizations,
    // Organization resource level
    UpdateOrganization,
    DeleteOrganization,
    GetOrganization,
    LinkEnvironment,
    InviteOrganizationGroup,
    RemoveOrganizationGroup,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ManageOrganizations => "MANAGE_ORGANIZATIONS",
            Permission::UpdateOrganization => "UPDATE_ORGANIZATION",
            Permission::DeleteOrganization => "DELETE_ORGANIZATION",
            Permission::GetOrganization => "GET_ORGANIZATION",
            Permission::LinkEnvironment => "LINK_ENVIRONMENT",
            Permission::InviteOrganizationGroup => "INVITE_ORGANIZATION_GROUP",
            Permission::RemoveOrganizationGroup => "REMOVE_ORGANIZATION_GROUP",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MANAGE_ORGANIZATIONS" => Ok(Permission::ManageOrganizations),
            "UPDATE_ORGANIZATION" => Ok(Permission::UpdateOrganization),
            "DELETE_ORGANIZATION" => Ok(Permission::DeleteOrganization),
            "GET_ORGANIZATION" => Ok(Permission::GetOrganization),
            "LINK_ENVIRONMENT" => Ok(Permission::LinkEnvironment),
            "INVITE_ORGANIZATION_GROUP" => Ok(Permission::InviteOrganizationGroup),
            "REMOVE_ORGANIZATION_GROUP" => Ok(Permission::RemoveOrganizationGroup),
            other => Err(format!("Unknown permission: {other}")),
        }
    }
}

/// Every tenant-level permission
pub const TENANT_ALL: &[Permission] = &[Permission::ManageOrganizations];

/// Granted to the owning group of an organization
pub const ORGANIZATION_ALL: &[Permission] = &[
    Permission::UpdateOrganization,
    Permission::DeleteOrganization,
    Permission::LinkEnvironment,
    Permission::GetOrganization,
    Permission::InviteOrganizationGroup,
    Permission::RemoveOrganizationGroup,
];

/// Granted to groups invited into an organization
pub const ORGANIZATION_INVITED: &[Permission] =
    &[Permission::LinkEnvironment, Permission::GetOrganization];

#[derive(Debug, thiserror::Error)]
pub enum PermissionError {
    #[error("User {username} is not authorized to perform: {permission}")]
    TenantDenied {
        username: String,
        permission: Permission,
    },

    #[error("User {username} is not authorized to perform: {permission} on resource: {resource_uri}")]
    ResourceDenied {
        username: String,
        permission: Permission,
        resource_uri: String,
    },

    #[error("Failed to check permissions: {0}")]
    Repository(#[from] RepositoryError),
}

/// Write side of the resource policy store, used inside a unit of work.
/// One policy per (group, resource); both operations are idempotent.
#[async_trait]
pub trait ResourcePolicyStore: Send {
    /// Replace the permission set of `group` on the resource
    async fn attach_resource_policy(
        &mut self,
        group: &str,
        permissions: &[Permission],
        resource_uri: &str,
        resource_type: &str,
    ) -> Result<(), RepositoryError>;

    /// Remove the policy of `group` on the resource, if any
    async fn delete_resource_policy(
        &mut self,
        group: &str,
        resource_uri: &str,
        resource_type: &str,
    ) -> Result<(), RepositoryError>;
}

/// Read side of the resource policy store, used by the resource guard
#[async_trait]
pub trait ResourcePolicyRepository: Send + Sync {
    /// Permissions any of `groups` hold on the resource
    async fn find_permissions(
        &self,
        groups: &[String],
        resource_uri: &str,
    ) -> Result<Vec<Permission>, RepositoryError>;
}

/// Tenant-wide permissions granted to groups
#[async_trait]
pub trait TenantPolicyRepository: Send + Sync {
    async fn find_permissions(&self, groups: &[String]) -> Result<Vec<Permission>, RepositoryError>;
}

/// Guards invoked at the top of every protected operation, before any side effect
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check_tenant_permission(
        &self,
        ctx: &RequestContext,
        permission: Permission,
    ) -> Result<(), PermissionError>;

    async fn check_resource_permission(
        &self,
        ctx: &RequestContext,
        permission: Permission,
        resource_uri: &str,
    ) -> Result<(), PermissionError>;
}
