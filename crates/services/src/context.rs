use serde::{Deserialize, Serialize};

/// Identity of the authenticated caller, resolved by the transport layer
/// and passed explicitly into every service call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequestContext {
    pub username: String,
    pub groups: Vec<String>,
}

impl RequestContext {
    pub fn new(username: impl Into<String>, groups: Vec<String>) -> Self {
        Self {
            username: username.into(),
            groups,
        }
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}
