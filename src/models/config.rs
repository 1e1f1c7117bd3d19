use crate::proxy::ProxyConfig;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// SQLite database file; defaults to `<data_dir>/api_bridge.db`
    #[serde(default)]
    pub database_path: Option<String>,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
