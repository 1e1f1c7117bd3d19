use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How the gateway authenticates against an upstream API
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthScheme {
    /// `Authorization: Bearer <apiKey>`
    Bearer,
    /// `Authorization: Basic base64(apiKey[:secret])`
    Basic,
    /// `User-Token` / `User-Secret-Key` header pair
    HeaderPair,
    /// `api_key` / `api_secret` query parameters
    Query,
    /// Header built from `CustomAuth`
    Custom,
    #[default]
    None,
}

/// Header template used by `AuthScheme::Custom`.
///
/// `{{apiKey}}` and `{{secret}}` in the template are replaced verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomAuth {
    pub header_name: String,
    pub header_value_template: String,
}

/// A named upstream API target
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub name: String,
    /// Origin plus optional path prefix, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Informational only, not enforced by the proxy pipeline
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Empty = every path allowed
    #[serde(default)]
    pub allowed_path_prefixes: Vec<String>,
    /// Empty = every method allowed
    #[serde(default)]
    pub allowed_methods: Vec<String>,
    #[serde(default)]
    pub auth_scheme: AuthScheme,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub custom_auth: Option<CustomAuth>,
    /// Static headers merged into every outbound request, after auth headers
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

pub(crate) fn default_enabled() -> bool {
    true
}

impl Connection {
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            allowed_hosts: Vec::new(),
            allowed_path_prefixes: Vec::new(),
            allowed_methods: Vec::new(),
            auth_scheme: AuthScheme::None,
            api_key: None,
            secret: None,
            custom_auth: None,
            extra_headers: BTreeMap::new(),
            enabled: true,
        }
    }

    /// API key, treating an empty string as absent
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }

    /// Secret, treating an empty string as absent
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_deref().filter(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("allowed_hosts", &self.allowed_hosts)
            .field("allowed_path_prefixes", &self.allowed_path_prefixes)
            .field("allowed_methods", &self.allowed_methods)
            .field("auth_scheme", &self.auth_scheme)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "custom_auth",
                &self.custom_auth.as_ref().map(|c| c.header_name.as_str()),
            )
            .field("extra_headers", &self.extra_headers.keys().collect::<Vec<_>>())
            .field("enabled", &self.enabled)
            .finish()
    }
}
