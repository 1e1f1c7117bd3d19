use serde::{Deserialize, Serialize};

use super::connection::default_enabled;

/// Prefix every issued client token carries
pub const CLIENT_TOKEN_PREFIX: &str = "ab_";

/// An external consumer of the gateway
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    pub token: String,
    /// Empty = may use any connection
    #[serde(default)]
    pub allowed_connection_ids: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Client {
    pub fn new(id: impl Into<String>, name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            token: token.into(),
            allowed_connection_ids: Vec::new(),
            enabled: true,
        }
    }

    pub fn may_use(&self, connection_id: &str) -> bool {
        self.allowed_connection_ids.is_empty()
            || self.allowed_connection_ids.iter().any(|id| id == connection_id)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .field("allowed_connection_ids", &self.allowed_connection_ids)
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_may_use_with_empty_allow_list() {
        let client = Client::new("cl1", "Mobile", "ab_token");
        assert!(client.may_use("anything"));
    }

    #[test]
    fn test_may_use_with_allow_list() {
        let mut client = Client::new("cl1", "Mobile", "ab_token");
        client.allowed_connection_ids = vec!["c1".to_string()];
        assert!(client.may_use("c1"));
        assert!(!client.may_use("c2"));
    }

    #[test]
    fn test_debug_hides_token() {
        let client = Client::new("cl1", "Mobile", "ab_supersecret");
        assert!(!format!("{:?}", client).contains("supersecret"));
    }
}
