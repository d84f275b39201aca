pub mod ports;

pub use ports::*;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::RequestContext;

/// Permission checker backed by the tenant and resource policy stores
pub struct PolicyPermissionChecker {
    tenant_policies: Arc<dyn TenantPolicyRepository>,
    resource_policies: Arc<dyn ResourcePolicyRepository>,
    tenant_admin_group: String,
}

impl PolicyPermissionChecker {
    pub fn new(
        tenant_policies: Arc<dyn TenantPolicyRepository>,
        resource_policies: Arc<dyn ResourcePolicyRepository>,
        tenant_admin_group: String,
    ) -> Self {
        Self {
            tenant_policies,
            resource_policies,
            tenant_admin_group,
        }
    }

    pub fn from_config(
        tenant_policies: Arc<dyn TenantPolicyRepository>,
        resource_policies: Arc<dyn ResourcePolicyRepository>,
        config: &config::PermissionsConfig,
    ) -> Self {
        Self::new(
            tenant_policies,
            resource_policies,
            config.tenant_admin_group.clone(),
        )
    }
}

#[async_trait]
impl PermissionChecker for PolicyPermissionChecker {
    async fn check_tenant_permission(
        &self,
        ctx: &RequestContext,
        permission: Permission,
    ) -> Result<(), PermissionError> {
        if ctx.is_member_of(&self.tenant_admin_group) {
            debug!(username = %ctx.username, %permission, "Tenant admin bypass");
            return Ok(());
        }

        let granted = self.tenant_policies.find_permissions(&ctx.groups).await?;
        if granted.contains(&permission) {
            return Ok(());
        }

        warn!(username = %ctx.username, %permission, "Tenant permission denied");
        Err(PermissionError::TenantDenied {
            username: ctx.username.clone(),
            permission,
        })
    }

    async fn check_resource_permission(
        &self,
        ctx: &RequestContext,
        permission: Permission,
        resource_uri: &str,
    ) -> Result<(), PermissionError> {
        let granted = self
            .resource_policies
            .find_permissions(&ctx.groups, resource_uri)
            .await?;
        if granted.contains(&permission) {
            return Ok(());
        }

        warn!(
            username = %ctx.username,
            %permission,
            resource_uri,
            "Resource permission denied"
        );
        Err(PermissionError::ResourceDenied {
            username: ctx.username.clone(),
            permission,
            resource_uri: resource_uri.to_string(),
        })
    }
}
