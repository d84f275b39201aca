pub mod ports;


pub use ports::*;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::activity::Activity;
use crate::common::{generate_uri, Page, PageFilter, Pagination, RepositoryError};
use crate::context::RequestContext;
use crate::environment::Environment;
use crate::permissions::{
    Permission, PermissionChecker, PermissionError, ORGANIZATION_ALL, ORGANIZATION_INVITED,
};
use crate::unit_of_work::{UnitOfWork, UnitOfWorkFactory};

pub struct OrganizationServiceImpl {
    unit_of_work: Arc<dyn UnitOfWorkFactory>,
    permissions: Arc<dyn PermissionChecker>,
    pagination: Pagination,
}

impl OrganizationServiceImpl {
    pub fn new(
        unit_of_work: Arc<dyn UnitOfWorkFactory>,
        permissions: Arc<dyn PermissionChecker>,
        pagination: Pagination,
    ) -> Self {
        Self {
            unit_of_work,
            permissions,
            pagination,
        }
    }

    /// Convert RepositoryError to OrganizationError
    fn map_repository_error(err: RepositoryError) -> OrganizationError {
        match err {
            RepositoryError::NotFound(uri) => OrganizationError::NotFound(uri),
            RepositoryError::RequiredFieldMissing(field) => {
                OrganizationError::InvalidParams(format!("Required field is missing: {field}"))
            }
            RepositoryError::ValidationFailed(msg) => {
                OrganizationError::InvalidParams(format!("Validation failed: {msg}"))
            }
            other => OrganizationError::InternalError(other.to_string()),
        }
    }

    /// Policy lookups that fail are infrastructure errors, not denials
    fn map_permission_error(err: PermissionError) -> OrganizationError {
        match err {
            PermissionError::Repository(e) => Self::map_repository_error(e),
            denied => OrganizationError::AuthorizationDenied(denied),
        }
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, OrganizationError> {
        self.unit_of_work
            .begin()
            .await
            .map_err(Self::map_repository_error)
    }

    async fn commit(uow: Box<dyn UnitOfWork>) -> Result<(), OrganizationError> {
        uow.commit().await.map_err(Self::map_repository_error)
    }

    async fn require_tenant(
        &self,
        ctx: &RequestContext,
        permission: Permission,
    ) -> Result<(), OrganizationError> {
        self.permissions
            .check_tenant_permission(ctx, permission)
            .await
            .map_err(Self::map_permission_error)
    }

    async fn require_resource(
        &self,
        ctx: &RequestContext,
        permission: Permission,
        organization_uri: &str,
    ) -> Result<(), OrganizationError> {
        self.permissions
            .check_resource_permission(ctx, permission, organization_uri)
            .await
            .map_err(Self::map_permission_error)
    }

    async fn load_organization(
        uow: &mut Box<dyn UnitOfWork>,
        organization_uri: &str,
    ) -> Result<Organization, OrganizationError> {
        uow.get_organization(organization_uri)
            .await
            .map_err(Self::map_repository_error)?
            .ok_or_else(|| OrganizationError::NotFound(organization_uri.to_string()))
    }

    async fn grant_owner_permissions(
        uow: &mut Box<dyn UnitOfWork>,
        organization: &Organization,
    ) -> Result<(), OrganizationError> {
        uow.attach_resource_policy(
            &organization.saml_group_name,
            ORGANIZATION_ALL,
            &organization.organization_uri,
            ORGANIZATION_RESOURCE_TYPE,
        )
        .await
        .map_err(Self::map_repository_error)
    }

    fn already_member(group: &str, organization: &Organization) -> OrganizationError {
        OrganizationError::UnauthorizedOperation {
            action: OperationAction::InviteTeam,
            reason: DenialReason::AlreadyMember,
            message: format!(
                "Team {} is already admin of the organization {}",
                group, organization.name
            ),
        }
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), OrganizationError> {
    if value.trim().is_empty() {
        return Err(OrganizationError::InvalidParams(format!(
            "{field} cannot be empty"
        )));
    }
    Ok(())
}

#[async_trait]
impl OrganizationServiceTrait for OrganizationServiceImpl {
    async fn create_organization(
        &self,
        ctx: &RequestContext,
        request: CreateOrganizationRequest,
    ) -> Result<Organization, OrganizationError> {
        self.require_tenant(ctx, Permission::ManageOrganizations)
            .await?;

        require_non_empty(&request.label, "label")?;
        require_non_empty(&request.saml_group_name, "SamlGroupName")?;

        let now = Utc::now();
        let organization = Organization {
            organization_uri: generate_uri(),
            name: request.label.clone(),
            label: request.label,
            description: request
                .description
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            tags: request.tags,
            owner: ctx.username.clone(),
            saml_group_name: request.saml_group_name,
            created: now,
            updated: now,
            user_role_in_organization: Some(OrganizationUserRole::Owner),
        };

        let mut uow = self.begin().await?;
        uow.insert_organization(&organization)
            .await
            .map_err(Self::map_repository_error)?;

        let activity = Activity::new(
            "org:create",
            &ctx.username,
            format!(
                "{} created organization {}",
                ctx.username, organization.name
            ),
            &organization.organization_uri,
            "org",
        );
        uow.append_activity(&activity)
            .await
            .map_err(Self::map_repository_error)?;

        Self::grant_owner_permissions(&mut uow, &organization).await?;
        Self::commit(uow).await?;

        info!(
            organization_uri = %organization.organization_uri,
            owner_group = %organization.saml_group_name,
            username = %ctx.username,
            "Created organization"
        );
        Ok(organization)
    }

    async fn update_organization(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        request: UpdateOrganizationRequest,
    ) -> Result<Organization, OrganizationError> {
        self.require_resource(ctx, Permission::UpdateOrganization, organization_uri)
            .await?;

        if let Some(ref label) = request.label {
            require_non_empty(label, "label")?;
        }

        let mut uow = self.begin().await?;
        let mut organization = Self::load_organization(&mut uow, organization_uri).await?;

        if let Some(label) = request.label {
            organization.label = label;
        }
        if let Some(description) = request.description {
            organization.description = description;
        }
        if let Some(tags) = request.tags {
            organization.tags = tags;
        }
        organization.updated = Utc::now();

        uow.update_organization(&organization)
            .await
            .map_err(Self::map_repository_error)?;

        let activity = Activity::new(
            "org:update",
            &ctx.username,
            format!(
                "{} updated organization {}",
                ctx.username, organization.name
            ),
            &organization.organization_uri,
            "org",
        );
        uow.append_activity(&activity)
            .await
            .map_err(Self::map_repository_error)?;

        Self::grant_owner_permissions(&mut uow, &organization).await?;
        Self::commit(uow).await?;

        info!(organization_uri, username = %ctx.username, "Updated organization");
        Ok(organization)
    }

    async fn get_organization(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
    ) -> Result<Organization, OrganizationError> {
        self.require_resource(ctx, Permission::GetOrganization, organization_uri)
            .await?;

        let mut uow = self.begin().await?;
        let organization = Self::load_organization(&mut uow, organization_uri).await?;
        Self::commit(uow).await?;
        Ok(organization)
    }

    async fn list_organizations(
        &self,
        ctx: &RequestContext,
        filter: PageFilter,
    ) -> Result<Page<Organization>, OrganizationError> {
        let query = self.pagination.resolve(&filter);
        debug!(username = %ctx.username, page = query.page, "Listing organizations");

        let mut uow = self.begin().await?;
        let page = uow
            .list_user_organizations(&ctx.username, &ctx.groups, &query)
            .await
            .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;
        Ok(page)
    }

    async fn list_organization_environments(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        filter: PageFilter,
    ) -> Result<Page<Environment>, OrganizationError> {
        self.require_resource(ctx, Permission::GetOrganization, organization_uri)
            .await?;

        let query = self.pagination.resolve(&filter);
        let mut uow = self.begin().await?;
        let page = uow
            .list_organization_environments(organization_uri, &query)
            .await
            .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;
        Ok(page)
    }

    async fn list_organization_groups(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        filter: PageFilter,
    ) -> Result<Page<OrganizationGroup>, OrganizationError> {
        self.require_resource(ctx, Permission::GetOrganization, organization_uri)
            .await?;

        let query = self.pagination.resolve(&filter);
        let mut uow = self.begin().await?;
        let page = uow
            .list_organization_groups(organization_uri, &query)
            .await
            .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;
        Ok(page)
    }

    async fn count_organization_resources(
        &self,
        _ctx: &RequestContext,
        organization_uri: &str,
        group: &str,
    ) -> Result<OrganizationResourceCount, OrganizationError> {
        let mut uow = self.begin().await?;
        let environments = uow
            .count_organization_environments(organization_uri)
            .await
            .map_err(Self::map_repository_error)?;
        let groups = uow
            .count_invited_groups(organization_uri, group)
            .await
            .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;

        // Users are not tracked per organization
        Ok(OrganizationResourceCount {
            environments,
            groups,
            users: 0,
        })
    }

    async fn resolve_user_role(
        &self,
        ctx: &RequestContext,
        organization: &Organization,
    ) -> Result<OrganizationUserRole, OrganizationError> {
        if organization.owner == ctx.username {
            return Ok(OrganizationUserRole::Owner);
        }
        if ctx.is_member_of(&organization.saml_group_name) {
            return Ok(OrganizationUserRole::Admin);
        }

        let mut uow = self.begin().await?;
        let membership = uow
            .find_organization_membership(&organization.organization_uri, &ctx.groups)
            .await
            .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;

        Ok(match membership {
            Some(_) => OrganizationUserRole::Invited,
            None => OrganizationUserRole::NoPermission,
        })
    }

    async fn archive_organization(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
    ) -> Result<bool, OrganizationError> {
        self.require_tenant(ctx, Permission::ManageOrganizations)
            .await?;
        self.require_resource(ctx, Permission::DeleteOrganization, organization_uri)
            .await?;

        let mut uow = self.begin().await?;
        let organization = Self::load_organization(&mut uow, organization_uri).await?;

        let environments = uow
            .count_organization_environments(organization_uri)
            .await
            .map_err(Self::map_repository_error)?;
        if environments > 0 {
            warn!(
                organization_uri,
                environments, "Refusing to archive organization with linked environments"
            );
            return Err(OrganizationError::UnauthorizedOperation {
                action: OperationAction::ArchiveOrganization,
                reason: DenialReason::LinkedEnvironments,
                message: "The organization you tried to delete has linked environments"
                    .to_string(),
            });
        }

        uow.delete_organization(organization_uri)
            .await
            .map_err(Self::map_repository_error)?;
        uow.delete_resource_policy(
            &organization.saml_group_name,
            &organization.organization_uri,
            ORGANIZATION_RESOURCE_TYPE,
        )
        .await
        .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;

        info!(organization_uri, username = %ctx.username, "Archived organization");
        Ok(true)
    }

    async fn invite_group(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        request: InviteGroupRequest,
    ) -> Result<Organization, OrganizationError> {
        self.require_tenant(ctx, Permission::ManageOrganizations)
            .await?;
        self.require_resource(ctx, Permission::InviteOrganizationGroup, organization_uri)
            .await?;

        let group = request.group_uri;
        require_non_empty(&group, "groupUri")?;

        let mut uow = self.begin().await?;
        let organization = Self::load_organization(&mut uow, organization_uri).await?;
        if group == organization.saml_group_name {
            warn!(organization_uri, group = %group, "Owner group cannot be invited");
            return Err(Self::already_member(&group, &organization));
        }

        let existing = uow
            .find_group_membership(organization_uri, &group)
            .await
            .map_err(Self::map_repository_error)?;
        if existing.is_some() {
            warn!(organization_uri, group = %group, "Group is already a member");
            return Err(Self::already_member(&group, &organization));
        }

        let membership = OrganizationGroup {
            organization_uri: organization.organization_uri.clone(),
            group_uri: group.clone(),
            invited_by: Some(ctx.username.clone()),
            created: Utc::now(),
        };
        // A concurrent invite can slip past the check above; the primary key catches it
        uow.insert_group_membership(&membership)
            .await
            .map_err(|e| match e {
                RepositoryError::AlreadyExists => Self::already_member(&group, &organization),
                other => Self::map_repository_error(other),
            })?;

        uow.attach_resource_policy(
            &group,
            ORGANIZATION_INVITED,
            &organization.organization_uri,
            ORGANIZATION_RESOURCE_TYPE,
        )
        .await
        .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;

        info!(organization_uri, group = %group, username = %ctx.username, "Invited group");
        Ok(organization)
    }

    async fn remove_group(
        &self,
        ctx: &RequestContext,
        organization_uri: &str,
        group: &str,
    ) -> Result<Organization, OrganizationError> {
        self.require_tenant(ctx, Permission::ManageOrganizations)
            .await?;
        self.require_resource(ctx, Permission::RemoveOrganizationGroup, organization_uri)
            .await?;

        let mut uow = self.begin().await?;
        let organization = Self::load_organization(&mut uow, organization_uri).await?;

        if group == organization.saml_group_name {
            warn!(organization_uri, group, "Refusing to remove owner group");
            return Err(OrganizationError::UnauthorizedOperation {
                action: OperationAction::RemoveTeam,
                reason: DenialReason::OwnerGroup,
                message: format!(
                    "Team: {} is the owner of the organization {}",
                    group, organization.name
                ),
            });
        }

        let environments = uow
            .count_group_environments(organization_uri, group)
            .await
            .map_err(Self::map_repository_error)?;
        if environments > 0 {
            warn!(organization_uri, group, environments, "Group still owns environments");
            return Err(OrganizationError::ResourcesFound {
                action: OperationAction::RemoveTeam,
                message: format!(
                    "Team: {} has {} linked environments on this organization.",
                    group, environments
                ),
                count: environments,
            });
        }

        let removed = uow
            .delete_group_membership(organization_uri, group)
            .await
            .map_err(Self::map_repository_error)?;

        // Policies are cleaned up even when no membership row existed
        uow.delete_resource_policy(
            group,
            &organization.organization_uri,
            ORGANIZATION_RESOURCE_TYPE,
        )
        .await
        .map_err(Self::map_repository_error)?;
        Self::commit(uow).await?;

        info!(
            organization_uri,
            group,
            membership_removed = removed,
            username = %ctx.username,
            "Removed group"
        );
        Ok(organization)
    }

    async fn resolve_organization_by_env(
        &self,
        _ctx: &RequestContext,
        environment_uri: &str,
    ) -> Result<Organization, OrganizationError> {
        let mut uow = self.begin().await?;
        let environment = uow
            .get_environment(environment_uri)
            .await
            .map_err(Self::map_repository_error)?
            .ok_or_else(|| OrganizationError::EnvironmentNotFound(environment_uri.to_string()))?;
        let organization = Self::load_organization(&mut uow, &environment.organization_uri).await?;
        Self::commit(uow).await?;
        Ok(organization)
    }
}
