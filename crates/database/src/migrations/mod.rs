use crate::pool::DbPool;
use anyhow::{Context, Result};
use refinery::load_sql_migrations;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable overriding where the `V*__*.sql` files are read from
pub const MIGRATIONS_DIR_ENV: &str = "DATABASE_MIGRATIONS_DIR";

/// Resolve the migration directory. Defaults to the crate's `src/migrations/sql`
/// relative to the workspace root.
pub fn migrations_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(MIGRATIONS_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }

    Ok(std::env::current_dir()
        .context("Failed to get current directory")?
        .join("crates/database/src/migrations/sql"))
}

/// Run database migrations
pub async fn run(pool: &DbPool) -> Result<()> {
    run_from_dir(pool, &migrations_dir()?).await
}

/// Run the migrations found in `migrations_path`
pub async fn run_from_dir(pool: &DbPool, migrations_path: &Path) -> Result<()> {
    let mut client = pool
        .get()
        .await
        .context("Failed to get database connection for migrations")?;

    let migrations = load_sql_migrations(migrations_path).context(format!(
        "Failed to load migrations from {migrations_path:?}"
    ))?;

    let migration_report = refinery::Runner::new(&migrations)
        .run_async(&mut **client)
        .await
        .context("Failed to run migrations")?;

    for migration in migration_report.applied_migrations() {
        info!("Applied migration: {}", migration.name());
    }

    info!("All migrations completed successfully");
    Ok(())
}
