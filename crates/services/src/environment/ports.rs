use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{Page, PageQuery, RepositoryError};

/// Cloud environment linked to exactly one organization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub environment_uri: String,
    pub organization_uri: String,
    pub label: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    #[serde(rename = "AwsAccountId")]
    pub aws_account_id: String,
    pub region: String,
    pub owner: String,
    #[serde(rename = "SamlGroupName")]
    pub saml_group_name: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Environment queries available inside a unit of work
#[async_trait]
pub trait EnvironmentStore: Send {
    async fn get_environment(
        &mut self,
        environment_uri: &str,
    ) -> Result<Option<Environment>, RepositoryError>;

    /// Number of environments linked to the organization
    async fn count_organization_environments(
        &mut self,
        organization_uri: &str,
    ) -> Result<i64, RepositoryError>;

    /// Number of environments in the organization owned by `group`
    async fn count_group_environments(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<i64, RepositoryError>;

    /// Environments of the organization, optionally filtered on label, description or region
    async fn list_organization_environments(
        &mut self,
        organization_uri: &str,
        query: &PageQuery,
    ) -> Result<Page<Environment>, RepositoryError>;
}
