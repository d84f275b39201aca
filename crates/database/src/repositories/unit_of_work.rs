use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, map_pool_error};
use crate::retry_db;
use async_trait::async_trait;
use deadpool_postgres::Object;
use services::common::RepositoryError;
use services::unit_of_work::{UnitOfWork, UnitOfWorkFactory};
use tracing::{debug, warn};

/// Opens a PostgreSQL transaction per unit of work
#[derive(Clone)]
pub struct PgUnitOfWorkFactory {
    pool: DbPool,
}

impl PgUnitOfWorkFactory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgUnitOfWorkFactory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let client = retry_db!("begin_unit_of_work", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client.batch_execute("BEGIN").await.map_err(map_db_error)?;
            Ok(client)
        })?;

        debug!("Began unit of work");
        Ok(Box::new(PgUnitOfWork {
            client: Some(client),
        }))
    }
}

/// A pooled connection with an open transaction.
///
/// Dropping it before [`UnitOfWork::commit`] issues `ROLLBACK` on the
/// connection before it goes back to the pool.
pub struct PgUnitOfWork {
    client: Option<Object>,
}

impl PgUnitOfWork {
    pub(crate) fn client(&self) -> Result<&Object, RepositoryError> {
        self.client.as_ref().ok_or_else(|| {
            RepositoryError::DatabaseError(anyhow::anyhow!("Unit of work already finished"))
        })
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(mut self: Box<Self>) -> Result<(), RepositoryError> {
        let client = self.client.take().ok_or_else(|| {
            RepositoryError::DatabaseError(anyhow::anyhow!("Unit of work already finished"))
        })?;

        client.batch_execute("COMMIT").await.map_err(map_db_error)?;
        debug!("Committed unit of work");
        Ok(())
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        warn!(error = %e, "Rollback failed, discarding connection");
                        drop(Object::take(client));
                    } else {
                        debug!("Rolled back unit of work");
                    }
                });
            }
            // No runtime to roll back on; close the connection instead of
            // returning it to the pool mid-transaction
            Err(_) => drop(Object::take(client)),
        }
    }
}
