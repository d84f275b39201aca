use services::common::RepositoryError;
use services::permissions::Permission;
use tokio_postgres::error::SqlState;

/// Convert tokio_postgres::Error to RepositoryError
pub fn map_db_error(err: tokio_postgres::Error) -> RepositoryError {
    if err.is_closed() {
        return RepositoryError::ConnectionFailed("Connection closed".to_string());
    }

    if let Some(db_err) = err.as_db_error() {
        let message = db_err.message();

        match db_err.code() {
            // Integrity constraint violations
            &SqlState::UNIQUE_VIOLATION => RepositoryError::AlreadyExists,
            &SqlState::FOREIGN_KEY_VIOLATION => {
                RepositoryError::ForeignKeyViolation(message.to_string())
            }
            &SqlState::NOT_NULL_VIOLATION => {
                RepositoryError::RequiredFieldMissing(message.to_string())
            }
            &SqlState::CHECK_VIOLATION => RepositoryError::ValidationFailed(message.to_string()),
            &SqlState::RESTRICT_VIOLATION => RepositoryError::DependencyExists(message.to_string()),

            &SqlState::T_R_SERIALIZATION_FAILURE | &SqlState::T_R_DEADLOCK_DETECTED => {
                RepositoryError::TransactionConflict
            }

            &SqlState::INVALID_PASSWORD | &SqlState::INVALID_AUTHORIZATION_SPECIFICATION => {
                RepositoryError::AuthenticationFailed
            }
            &SqlState::CONNECTION_EXCEPTION
            | &SqlState::CONNECTION_DOES_NOT_EXIST
            | &SqlState::CONNECTION_FAILURE => {
                RepositoryError::ConnectionFailed(message.to_string())
            }

            _ => RepositoryError::DatabaseError(anyhow::anyhow!(
                "Database error ({}): {}",
                db_err.code().code(),
                message
            )),
        }
    } else {
        RepositoryError::DatabaseError(err.into())
    }
}

/// Convert a pool checkout failure to RepositoryError
pub fn map_pool_error(err: deadpool_postgres::PoolError) -> RepositoryError {
    RepositoryError::PoolError(anyhow::anyhow!("Failed to get database connection: {err}"))
}

/// `ILIKE` pattern for a lowercased search term, with wildcards in the term escaped
pub fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(|t| {
        let escaped = t
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        format!("%{escaped}%")
    })
}

/// Permission names as stored in `TEXT[]` columns
pub fn permission_names(permissions: &[Permission]) -> Vec<String> {
    permissions.iter().map(|p| p.as_str().to_string()).collect()
}

/// Parse stored permission names. Unknown names indicate a corrupt policy row.
pub fn parse_permissions(names: Vec<String>) -> Result<Vec<Permission>, RepositoryError> {
    names
        .into_iter()
        .map(|name| {
            name.parse::<Permission>()
                .map_err(|e| RepositoryError::DataConversionError(anyhow::anyhow!(e)))
        })
        .collect()
}
