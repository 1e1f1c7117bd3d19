// Middleware module - Axum middleware

pub mod auth;
pub mod cors;

pub use auth::{client_token_middleware, extract_client_token, ClientToken};
pub use cors::cors_layer;
