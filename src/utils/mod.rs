pub mod http;
pub mod token;
