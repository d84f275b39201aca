use crate::repositories::unit_of_work::PgUnitOfWork;
use crate::repositories::utils::{like_pattern, map_db_error};
use async_trait::async_trait;
use services::common::{Page, PageQuery, RepositoryError};
use services::environment::{Environment, EnvironmentStore};
use tokio_postgres::Row;

const ENVIRONMENT_COLUMNS: &str = "environment_uri, organization_uri, label, name, description, \
     tags, aws_account_id, region, owner, saml_group_name, created, updated";

const ORGANIZATION_ENVIRONMENTS: &str = r#"
    FROM environments
    WHERE organization_uri = $1
    AND (
        $2::text IS NULL
        OR label ILIKE $2
        OR description ILIKE $2
        OR aws_account_id ILIKE $2
        OR region ILIKE $2
        OR array_to_string(tags, ' ') ILIKE $2
    )
"#;

fn row_to_environment(row: &Row) -> Environment {
    Environment {
        environment_uri: row.get("environment_uri"),
        organization_uri: row.get("organization_uri"),
        label: row.get("label"),
        name: row.get("name"),
        description: row.get("description"),
        tags: row.get("tags"),
        aws_account_id: row.get("aws_account_id"),
        region: row.get("region"),
        owner: row.get("owner"),
        saml_group_name: row.get("saml_group_name"),
        created: row.get("created"),
        updated: row.get("updated"),
    }
}

#[async_trait]
impl EnvironmentStore for PgUnitOfWork {
    async fn get_environment(
        &mut self,
        environment_uri: &str,
    ) -> Result<Option<Environment>, RepositoryError> {
        let row = self
            .client()?
            .query_opt(
                &format!("SELECT {ENVIRONMENT_COLUMNS} FROM environments WHERE environment_uri = $1"),
                &[&environment_uri],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(row_to_environment))
    }

    async fn count_organization_environments(
        &mut self,
        organization_uri: &str,
    ) -> Result<i64, RepositoryError> {
        let row = self
            .client()?
            .query_one(
                "SELECT COUNT(*) FROM environments WHERE organization_uri = $1",
                &[&organization_uri],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.get(0))
    }

    async fn count_group_environments(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<i64, RepositoryError> {
        let row = self
            .client()?
            .query_one(
                "SELECT COUNT(*) FROM environments \
                 WHERE organization_uri = $1 AND saml_group_name = $2",
                &[&organization_uri, &group],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.get(0))
    }

    async fn list_organization_environments(
        &mut self,
        organization_uri: &str,
        query: &PageQuery,
    ) -> Result<Page<Environment>, RepositoryError> {
        let pattern = like_pattern(query.normalized_term().as_deref());
        let client = self.client()?;

        let count: i64 = client
            .query_one(
                &format!("SELECT COUNT(*) {ORGANIZATION_ENVIRONMENTS}"),
                &[&organization_uri, &pattern],
            )
            .await
            .map_err(map_db_error)?
            .get(0);

        let rows = client
            .query(
                &format!(
                    "SELECT {ENVIRONMENT_COLUMNS} {ORGANIZATION_ENVIRONMENTS} \
                     ORDER BY label, environment_uri LIMIT $3 OFFSET $4"
                ),
                &[&organization_uri, &pattern, &query.limit(), &query.offset()],
            )
            .await
            .map_err(map_db_error)?;

        Ok(Page::new(
            rows.iter().map(row_to_environment).collect(),
            count,
            query,
        ))
    }
}
