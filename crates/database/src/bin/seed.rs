use anyhow::{Context, Result};
use database::Database;
use services::permissions::TENANT_ALL;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (ignore errors if not found)
    let _ = dotenvy::dotenv();

    let config = config::ApiConfig::resolve().context("Failed to load config")?;
    init_tracing(&config.logging);

    info!("Starting database seeding");

    let database = Database::from_config(&config.database)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    database
        .run_migrations()
        .await
        .context("Failed to run migrations")?;
    info!("Database migrations completed");

    let admin_group = &config.permissions.tenant_admin_group;
    database
        .tenant_policies
        .grant(admin_group, TENANT_ALL)
        .await
        .context("Failed to seed tenant admin policy")?;
    info!(group = %admin_group, "Database seeding completed");

    Ok(())
}

fn init_tracing(logging: &config::LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directives()));

    match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .compact()
            .with_target(false)
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .init(),
    }
}
