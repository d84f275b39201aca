use crate::repositories::unit_of_work::PgUnitOfWork;
use crate::repositories::utils::{like_pattern, map_db_error};
use async_trait::async_trait;
use services::common::{Page, PageQuery, RepositoryError};
use services::organization::{Organization, OrganizationGroup, OrganizationStore};
use tokio_postgres::Row;
use tracing::debug;

const ORGANIZATION_COLUMNS: &str = "o.organization_uri, o.label, o.name, o.description, o.tags, \
     o.owner, o.saml_group_name, o.created, o.updated";

const GROUP_COLUMNS: &str = "organization_uri, group_uri, invited_by, created";

/// Organizations visible to `$1` (username) holding `$2` (groups), matching `$3` (pattern)
const VISIBLE_ORGANIZATIONS: &str = r#"
    FROM organizations o
    WHERE (
        o.owner = $1
        OR o.saml_group_name = ANY($2)
        OR EXISTS (
            SELECT 1 FROM organization_groups g
            WHERE g.organization_uri = o.organization_uri AND g.group_uri = ANY($2)
        )
    )
    AND (
        $3::text IS NULL
        OR o.label ILIKE $3
        OR o.description ILIKE $3
        OR array_to_string(o.tags, ' ') ILIKE $3
    )
"#;

fn row_to_organization(row: &Row) -> Organization {
    Organization {
        organization_uri: row.get("organization_uri"),
        label: row.get("label"),
        name: row.get("name"),
        description: row.get("description"),
        tags: row.get("tags"),
        owner: row.get("owner"),
        saml_group_name: row.get("saml_group_name"),
        created: row.get("created"),
        updated: row.get("updated"),
        user_role_in_organization: None,
    }
}

fn row_to_group(row: &Row) -> OrganizationGroup {
    OrganizationGroup {
        organization_uri: row.get("organization_uri"),
        group_uri: row.get("group_uri"),
        invited_by: row.get("invited_by"),
        created: row.get("created"),
    }
}

#[async_trait]
impl OrganizationStore for PgUnitOfWork {
    async fn get_organization(
        &mut self,
        organization_uri: &str,
    ) -> Result<Option<Organization>, RepositoryError> {
        let row = self
            .client()?
            .query_opt(
                &format!(
                    "SELECT {ORGANIZATION_COLUMNS} FROM organizations o WHERE o.organization_uri = $1"
                ),
                &[&organization_uri],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(row_to_organization))
    }

    async fn insert_organization(
        &mut self,
        organization: &Organization,
    ) -> Result<(), RepositoryError> {
        self.client()?
            .execute(
                r#"
                INSERT INTO organizations (
                    organization_uri, label, name, description, tags,
                    owner, saml_group_name, created, updated
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
                &[
                    &organization.organization_uri,
                    &organization.label,
                    &organization.name,
                    &organization.description,
                    &organization.tags,
                    &organization.owner,
                    &organization.saml_group_name,
                    &organization.created,
                    &organization.updated,
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!(organization_uri = %organization.organization_uri, "Inserted organization");
        Ok(())
    }

    async fn update_organization(
        &mut self,
        organization: &Organization,
    ) -> Result<(), RepositoryError> {
        let rows_affected = self
            .client()?
            .execute(
                r#"
                UPDATE organizations
                SET label = $2, description = $3, tags = $4, updated = $5
                WHERE organization_uri = $1
                "#,
                &[
                    &organization.organization_uri,
                    &organization.label,
                    &organization.description,
                    &organization.tags,
                    &organization.updated,
                ],
            )
            .await
            .map_err(map_db_error)?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound(
                organization.organization_uri.clone(),
            ));
        }
        Ok(())
    }

    async fn delete_organization(&mut self, organization_uri: &str) -> Result<bool, RepositoryError> {
        let rows_affected = self
            .client()?
            .execute(
                "DELETE FROM organizations WHERE organization_uri = $1",
                &[&organization_uri],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected > 0)
    }

    async fn list_user_organizations(
        &mut self,
        username: &str,
        groups: &[String],
        query: &PageQuery,
    ) -> Result<Page<Organization>, RepositoryError> {
        let pattern = like_pattern(query.normalized_term().as_deref());
        let client = self.client()?;

        let count: i64 = client
            .query_one(
                &format!("SELECT COUNT(*) {VISIBLE_ORGANIZATIONS}"),
                &[&username, &groups, &pattern],
            )
            .await
            .map_err(map_db_error)?
            .get(0);

        let rows = client
            .query(
                &format!(
                    "SELECT {ORGANIZATION_COLUMNS} {VISIBLE_ORGANIZATIONS} \
                     ORDER BY o.label, o.organization_uri LIMIT $4 OFFSET $5"
                ),
                &[
                    &username,
                    &groups,
                    &pattern,
                    &query.limit(),
                    &query.offset(),
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!(username, count, "Listed user organizations");
        Ok(Page::new(
            rows.iter().map(row_to_organization).collect(),
            count,
            query,
        ))
    }

    async fn find_group_membership(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<Option<OrganizationGroup>, RepositoryError> {
        let row = self
            .client()?
            .query_opt(
                &format!(
                    "SELECT {GROUP_COLUMNS} FROM organization_groups \
                     WHERE organization_uri = $1 AND group_uri = $2"
                ),
                &[&organization_uri, &group],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(row_to_group))
    }

    async fn find_organization_membership(
        &mut self,
        organization_uri: &str,
        groups: &[String],
    ) -> Result<Option<OrganizationGroup>, RepositoryError> {
        let row = self
            .client()?
            .query_opt(
                &format!(
                    "SELECT {GROUP_COLUMNS} FROM organization_groups \
                     WHERE organization_uri = $1 AND group_uri = ANY($2) \
                     ORDER BY created LIMIT 1"
                ),
                &[&organization_uri, &groups],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.as_ref().map(row_to_group))
    }

    async fn insert_group_membership(
        &mut self,
        membership: &OrganizationGroup,
    ) -> Result<(), RepositoryError> {
        self.client()?
            .execute(
                r#"
                INSERT INTO organization_groups (organization_uri, group_uri, invited_by, created)
                VALUES ($1, $2, $3, $4)
                "#,
                &[
                    &membership.organization_uri,
                    &membership.group_uri,
                    &membership.invited_by,
                    &membership.created,
                ],
            )
            .await
            .map_err(map_db_error)?;

        debug!(
            organization_uri = %membership.organization_uri,
            group = %membership.group_uri,
            "Inserted group membership"
        );
        Ok(())
    }

    async fn delete_group_membership(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<bool, RepositoryError> {
        let rows_affected = self
            .client()?
            .execute(
                "DELETE FROM organization_groups WHERE organization_uri = $1 AND group_uri = $2",
                &[&organization_uri, &group],
            )
            .await
            .map_err(map_db_error)?;

        Ok(rows_affected > 0)
    }

    async fn list_organization_groups(
        &mut self,
        organization_uri: &str,
        query: &PageQuery,
    ) -> Result<Page<OrganizationGroup>, RepositoryError> {
        let pattern = like_pattern(query.normalized_term().as_deref());
        let client = self.client()?;

        let count: i64 = client
            .query_one(
                "SELECT COUNT(*) FROM organization_groups \
                 WHERE organization_uri = $1 AND ($2::text IS NULL OR group_uri ILIKE $2)",
                &[&organization_uri, &pattern],
            )
            .await
            .map_err(map_db_error)?
            .get(0);

        let rows = client
            .query(
                &format!(
                    "SELECT {GROUP_COLUMNS} FROM organization_groups \
                     WHERE organization_uri = $1 AND ($2::text IS NULL OR group_uri ILIKE $2) \
                     ORDER BY group_uri LIMIT $3 OFFSET $4"
                ),
                &[&organization_uri, &pattern, &query.limit(), &query.offset()],
            )
            .await
            .map_err(map_db_error)?;

        Ok(Page::new(rows.iter().map(row_to_group).collect(), count, query))
    }

    async fn count_invited_groups(
        &mut self,
        organization_uri: &str,
        group: &str,
    ) -> Result<i64, RepositoryError> {
        let row = self
            .client()?
            .query_one(
                "SELECT COUNT(*) FROM organization_groups \
                 WHERE organization_uri = $1 AND group_uri <> $2",
                &[&organization_uri, &group],
            )
            .await
            .map_err(map_db_error)?;

        Ok(row.get(0))
    }
}
