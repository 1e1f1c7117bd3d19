pub mod audit;
pub mod client;
pub mod config;
pub mod connection;
pub mod settings;

pub use audit::AuditLogEntry;
pub use client::{Client, CLIENT_TOKEN_PREFIX};
pub use config::AppConfig;
pub use connection::{AuthScheme, Connection, CustomAuth};
pub use settings::Settings;
