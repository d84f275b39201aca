use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Page, PageFilter, PageQuery, RepositoryError};
use crate::context::RequestContext;
use crate::environment::Environment;
use crate::permissions::PermissionError;

/// Resource type under which organization policies are stored
pub const ORGANIZATION_RESOURCE_TYPE: &str = "Organization";

/// Description given to organizations created without one
pub const DEFAULT_DESCRIPTION: &str = "No description provided";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub organization_uri: String,
    pub label: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub owner: String,
    /// Group that owns and administers the organization, immutable after creation
    #[serde(rename = "SamlGroupName")]
    pub saml_group_name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Caller's role, only populated where the service computes it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role_in_organization: Option<OrganizationUserRole>,
}

/// Invited (non-owner) group of an organization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationGroup {
    pub organization_uri: String,
    pub group_uri: String,
    pub invited_by: Option<String>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrganizationUserRole {
    Owner,
    Admin,
    Invited,
    NoPermission,
}

impl std::fmt::Display for OrganizationUserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrganizationUserRole::Owner => write!(f, "Owner"),
            OrganizationUserRole::Admin => write!(f, "Admin"),
            OrganizationUserRole::Invited => write!(f, "Invited"),
            OrganizationUserRole::NoPermission => write!(f, "NoPermission"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationResourceCount {
    pub environments: i64,
    pub groups: i64,
    pub users: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganizationRequest {
    pub label: String,
    #[serde(rename = "SamlGroupName")]
    pub saml_group_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Mutable organization fields. The owning group cannot be patched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateOrganizationRequest {
    pub label: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteGroupRequest {
    pub group_uri: String,
}

/// Operation tag carried by business-rule denials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationAction {
    ArchiveOrganization,
    InviteTeam,
    RemoveTeam,
}

impl std::fmt::Display for OperationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationAction::ArchiveOrganization => write!(f, "ARCHIVE_ORGANIZATION"),
            OperationAction::InviteTeam => write!(f, "INVITE_TEAM"),
            OperationAction::RemoveTeam => write!(f, "REMOVE_TEAM"),
        }
    }
}

/// Why a business rule refused the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    LinkedEnvironments,
    AlreadyMember,
    OwnerGroup,
}

#[derive(Debug, thiserror::Error)]
pub enum OrganizationError {
    #[error("Unauthorized: {0}")]
    AuthorizationDenied(#[from] PermissionError),

    #[error("An error occurred (UnauthorizedOperation) when calling {action} operation: {message}")]
    UnauthorizedOperation {
        action: OperationAction,
        reason: DenialReason,
        message: String,
    },

    #[error("An error occurred (OrganizationResourcesFound) when calling {action} operation: {message}")]
    ResourcesFound {
        action: OperationAction,
        message: String,
        count: i64,
    },

    #[error("Organization not found: {0}")]
    NotFound(String),

    #[error("Environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Organization and membership queries available inside a unit of work.
/// Absence is reported as `None`/empty, never as an error.
#[async_trait]
pub trait OrganizationStore: Send {
    async fn get_organization(
        &mut self,
        organization_uri: &str,
    ) -> Result<Option<Organization>, RepositoryError>;

    async fn insert_organization(&mut self, organization: &Organization)
        -> Result<(), RepositoryError>;

    /// Persist label, description, tags and `updated`
    async fn update_organization(&mut self, organization: &Organization)
        -> Result<(), RepositoryError>;

    async fn delete_organization(&mut self, organization_uri: &str)
        -> Result<bool, RepositoryError>;

    /// Organizations the caller owns, administers through the owner group, or was invited to
    async fn list_user_organizations(
        &mut self,
        username: &str,
        groups: &[String],
        query: &PageQuery,
    ) -> Result<Page<Organization>, RepositoryError>;

    async fn find_group_membership(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<Option<OrganizationGroup>, RepositoryError>;

    /// Any membership row of the organization held by one of `groups`
    async fn find_organization_membership(
        &mut self,
        organization_uri: &str,
        groups: &[String],
    ) -> Result<Option<OrganizationGroup>, RepositoryError>;

    /// Fails with `RepositoryError::AlreadyExists` when the group is already a member
    async fn insert_group_membership(
        &mut self,
        membership: &OrganizationGroup,
    ) -> Result<(), RepositoryError>;

    async fn delete_group_membership(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<bool, RepositoryError>;

    async fn list_organization_groups(
        &mut self,
        organization_uri: &str,
        query: &PageQuery,
    ) -> Result<Page<OrganizationGroup>, RepositoryError>;

    /// Invited groups of the organization other than `group`
    async fn count_invited_groups(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<i64, RepositoryError>;
}

/// Service trait for organization operations
#[async_trait]
pub trait OrganizationServiceTrait: Send + Sync {
    /// Create an organization owned by the caller and the given group
    async fn create_organization(
        &self,
        ctx: &RequestContext,
        request: CreateOrganizationRequest,
    ) -> Result<Organization, OrganizationError>;

    /// Apply a patch to an organization
    async fn update_organization(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        request: UpdateOrganizationRequest,
    ) -> Result<Organization, OrganizationError>;

    async fn get_organization(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
    ) -> Result<Organization, OrganizationError>;

    /// Organizations visible to the caller
    async fn list_organizations(
        &self,
        ctx: &RequestContext,
        filter: PageFilter,
    ) -> Result<Page<Organization>, OrganizationError>;

    async fn list_organization_environments(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        filter: PageFilter,
    ) -> Result<Page<Environment>, OrganizationError>;

    async fn list_organization_groups(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        filter: PageFilter,
    ) -> Result<Page<OrganizationGroup>, OrganizationError>;

    async fn count_organization_resources(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        group: &str,
    ) -> Result<OrganizationResourceCount, OrganizationError>;

    /// Caller's role in an already loaded organization
    async fn resolve_user_role(
        &self,
        ctx: &RequestContext,
        organization: &Organization,
    ) -> Result<OrganizationUserRole, OrganizationError>;

    /// Delete an organization that has no linked environments
    async fn archive_organization(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
    ) -> Result<bool, OrganizationError>;

    async fn invite_group(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        request: InviteGroupRequest,
    ) -> Result<Organization, OrganizationError>;

    async fn remove_group(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        group: &str,
    ) -> Result<Organization, OrganizationError>;

    /// Parent organization of an environment
    async fn resolve_organization_by_env(
        &self,
        ctx: &RequestContext,
        environment_uri: &str,
    ) -> Result<Organization, OrganizationError>;
}
