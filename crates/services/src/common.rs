use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Length of the short resource identifiers (organization, environment, activity URIs)
pub const URI_LENGTH: usize = 8;

/// Generate a short, lowercase alphanumeric resource URI
pub fn generate_uri() -> String {
    Uuid::new_v4().simple().to_string()[..URI_LENGTH].to_string()
}

/// Shared error types for repository operations across all domains.
/// These errors represent infrastructure concerns (database, connections, etc.)
/// rather than domain-specific business logic.
#[derive(thiserror::Error, Debug)]
pub enum RepositoryError {
    #[error("'{0}' does not exist")]
    NotFound(String),
    #[error("Cannot add this resource as it already exists")]
    AlreadyExists,
    #[error("Required field is missing: {0}")]
    RequiredFieldMissing(String),
    #[error("Referenced entity does not exist: {0}")]
    ForeignKeyViolation(String),
    #[error("Data validation failed: {0}")]
    ValidationFailed(String),
    #[error("Cannot delete due to existing dependencies: {0}")]
    DependencyExists(String),
    #[error("Transaction conflict, please retry")]
    TransactionConflict,
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Database authentication failed")]
    AuthenticationFailed,
    #[error("Database connection pool error: {0}")]
    PoolError(#[source] anyhow::Error),
    #[error("Database operation error: {0}")]
    DatabaseError(#[source] anyhow::Error),
    #[error("Data conversion error: {0}")]
    DataConversionError(#[source] anyhow::Error),
}

/// Listing filter as supplied by callers. Missing values fall back to [`Pagination`] defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFilter {
    pub term: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// Resolved listing parameters handed to repositories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub term: Option<String>,
    pub page: u32,
    pub page_size: u32,
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.page_size as i64
    }

    /// Lowercased search term, if one was given
    pub fn normalized_term(&self) -> Option<String> {
        self.term.as_ref().map(|t| t.to_lowercase())
    }
}

/// Page size policy for listings
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::from(&config::PermissionsConfig::default())
    }
}

impl From<&config::PermissionsConfig> for Pagination {
    fn from(config: &config::PermissionsConfig) -> Self {
        Self {
            default_page_size: config.default_page_size.max(1),
            max_page_size: config.max_page_size.max(1),
        }
    }
}

impl Pagination {
    pub fn resolve(&self, filter: &PageFilter) -> PageQuery {
        let term = filter
            .term
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let page = filter.page.unwrap_or(1).max(1);
        let page_size = filter
            .page_size
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size);

        PageQuery {
            term,
            page,
            page_size,
        }
    }
}

/// One page of results with navigation metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub count: i64,
    pub page: u32,
    pub pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub nodes: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(nodes: Vec<T>, count: i64, query: &PageQuery) -> Self {
        let count = count.max(0);
        let page_size = query.page_size.max(1) as i64;
        let pages = ((count + page_size - 1) / page_size) as u32;

        Self {
            count,
            page: query.page,
            pages,
            has_next: query.page < pages,
            has_previous: query.page > 1,
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uri_shape() {
        let uri = generate_uri();
        assert_eq!(uri.len(), URI_LENGTH);
        assert!(uri
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(uri, generate_uri());
    }

    #[test]
    fn test_resolve_applies_defaults_and_clamps() {
        let pagination = Pagination {
            default_page_size: 10,
            max_page_size: 50,
        };

        let query = pagination.resolve(&PageFilter::default());
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 10);
        assert_eq!(query.term, None);

        let query = pagination.resolve(&PageFilter {
            term: Some("  ".to_string()),
            page: Some(0),
            page_size: Some(500),
        });
        assert_eq!(query.page, 1);
        assert_eq!(query.page_size, 50);
        assert_eq!(query.term, None);
    }

    #[test]
    fn test_page_metadata() {
        let query = PageQuery {
            term: None,
            page: 2,
            page_size: 10,
        };
        assert_eq!(query.offset(), 10);

        let page = Page::new(vec![1, 2, 3], 23, &query);
        assert_eq!(page.pages, 3);
        assert!(page.has_next);
        assert!(page.has_previous);

        let empty: Page<i32> = Page::new(vec![], 0, &query);
        assert_eq!(empty.pages, 0);
        assert!(!empty.has_next);
    }
}
