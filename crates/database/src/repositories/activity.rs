use crate::repositories::unit_of_work::PgUnitOfWork;
use crate::repositories::utils::map_db_error;
use async_trait::async_trait;
use services::activity::{Activity, ActivityLog};
use services::common::RepositoryError;

#[async_trait]
impl ActivityLog for PgUnitOfWork {
    async fn append_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError> {
        self.client()?
            .execute(
                r#"
                INSERT INTO activities (
                    activity_uri, action, label, owner, summary,
                    target_uri, target_type, created
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
                &[
                    &activity.activity_uri,
                    &activity.action,
                    &activity.label,
                    &activity.owner,
                    &activity.summary,
                    &activity.target_uri,
                    &activity.target_type,
                    &activity.created,
                ],
            )
            .await
            .map_err(map_db_error)?;

        Ok(())
    }
}
