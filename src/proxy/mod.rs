// proxy module - credential-injecting gateway

pub mod audit;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod executor;
pub mod handlers; // HTTP entry points
pub mod middleware; // Axum middleware
pub mod request;
pub mod server;
pub mod store;
pub mod target_url;
pub mod upstream; // Outbound HTTP client
pub mod validator;

pub use config::ProxyConfig;
pub use errors::{GatewayError, ProxyErrorKind};
pub use executor::ProxyExecutor;
pub use request::{ProxyRequest, ProxyResult, ProxySuccess};
pub use server::AxumServer;
pub use store::{MemoryStore, ProxyStore};
