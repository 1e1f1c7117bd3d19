use std::fs;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const DATA_DIR: &str = ".api_bridge";
const DATA_DIR_ENV: &str = "API_BRIDGE_DATA_DIR";
const CONFIG_FILE: &str = "config.json";
const DATABASE_FILE: &str = "api_bridge.db";

/// Get data directory path, creating it if needed.
///
/// `API_BRIDGE_DATA_DIR` overrides the default `~/.api_bridge`.
pub fn get_data_dir() -> AppResult<PathBuf> {
    let data_dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .ok_or_else(|| AppError::Config("Failed to get user home directory".to_string()))?
            .join(DATA_DIR),
    };

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// Load application config
pub fn load_app_config() -> AppResult<AppConfig> {
    let config_path = get_data_dir()?.join(CONFIG_FILE);

    if !config_path.exists() {
        return Ok(AppConfig::new());
    }

    let content = fs::read_to_string(&config_path)?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))
}

/// Save application config
pub fn save_app_config(config: &AppConfig) -> AppResult<()> {
    let config_path = get_data_dir()?.join(CONFIG_FILE);
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;
    Ok(())
}

/// Database location: `database_path` from config, else inside the data dir
pub fn resolve_database_path(config: &AppConfig) -> AppResult<PathBuf> {
    match config.database_path.as_deref().filter(|p| !p.is_empty()) {
        Some(path) => Ok(PathBuf::from(path)),
        None => Ok(get_data_dir()?.join(DATABASE_FILE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScopedEnvVar, ENV_LOCK};

    fn temp_data_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("api_bridge_{}_{}", name, uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_missing_config_file_gives_defaults() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = temp_data_dir("missing");
        let _env = ScopedEnvVar::set(DATA_DIR_ENV, &dir);

        let config = load_app_config().unwrap();
        assert_eq!(config.proxy.port, 8047);
        assert!(dir.exists());
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_save_then_load() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = temp_data_dir("roundtrip");
        let _env = ScopedEnvVar::set(DATA_DIR_ENV, &dir);

        let mut config = AppConfig::new();
        config.proxy.port = 9123;
        config.proxy.trust_forwarded_for = true;
        save_app_config(&config).unwrap();

        let loaded = load_app_config().unwrap();
        assert_eq!(loaded.proxy.port, 9123);
        assert!(loaded.proxy.trust_forwarded_for);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_invalid_config_is_config_error() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = temp_data_dir("invalid");
        let _env = ScopedEnvVar::set(DATA_DIR_ENV, &dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), "{ nope").unwrap();

        assert!(matches!(load_app_config(), Err(AppError::Config(_))));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_database_path_resolution() {
        let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let dir = temp_data_dir("db");
        let _env = ScopedEnvVar::set(DATA_DIR_ENV, &dir);

        let mut config = AppConfig::new();
        assert_eq!(resolve_database_path(&config).unwrap(), dir.join(DATABASE_FILE));

        config.database_path = Some("/var/lib/api_bridge/gw.db".to_string());
        assert_eq!(
            resolve_database_path(&config).unwrap(),
            PathBuf::from("/var/lib/api_bridge/gw.db")
        );
        let _ = fs::remove_dir_all(dir);
    }
}
