use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{generate_uri, RepositoryError};

/// Immutable audit record of a user action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub activity_uri: String,
    pub action: String,
    pub label: String,
    pub owner: String,
    pub summary: String,
    pub target_uri: String,
    pub target_type: String,
    pub created: DateTime<Utc>,
}

impl Activity {
    pub fn new(
        action: &str,
        owner: &str,
        summary: String,
        target_uri: &str,
        target_type: &str,
    ) -> Self {
        Self {
            activity_uri: generate_uri(),
            action: action.to_string(),
            label: action.to_string(),
            owner: owner.to_string(),
            summary,
            target_uri: target_uri.to_string(),
            target_type: target_type.to_string(),
            created: Utc::now(),
        }
    }
}

/// Append-only audit log. Records are never read back by services.
#[async_trait]
pub trait ActivityLog: Send {
    async fn append_activity(&mut self, activity: &Activity) -> Result<(), RepositoryError>;
}
