pub mod config;
pub mod db;
pub mod logger;

pub use config::{get_data_dir, load_app_config, resolve_database_path, save_app_config};
pub use db::SqliteStore;
pub use logger::init_logger;
