//! Credential injection for outbound requests.
//!
//! Injection never mutates the caller's headers: a copy is taken, the
//! connection's auth scheme is applied, then `extra_headers` are merged last
//! so they override anything set before them. Secret values never appear in
//! errors or logs.

use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use thiserror::Error;

use crate::models::{AuthScheme, Connection};

const API_KEY_PLACEHOLDER: &str = "{{apiKey}}";
const SECRET_PLACEHOLDER: &str = "{{secret}}";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("invalid value for header {0}")]
    InvalidHeaderValue(String),
}

pub fn inject_credentials(
    connection: &Connection,
    headers: &HeaderMap,
) -> Result<HeaderMap, InjectError> {
    let mut out = headers.clone();

    match connection.auth_scheme {
        AuthScheme::Bearer => {
            if let Some(api_key) = connection.api_key() {
                set_sensitive(&mut out, AUTHORIZATION, &format!("Bearer {}", api_key))?;
            }
        }
        AuthScheme::Basic => {
            if let Some(api_key) = connection.api_key() {
                let raw = match connection.secret() {
                    Some(secret) => format!("{}:{}", api_key, secret),
                    None => api_key.to_string(),
                };
                let encoded = general_purpose::STANDARD.encode(raw);
                set_sensitive(&mut out, AUTHORIZATION, &format!("Basic {}", encoded))?;
            }
        }
        AuthScheme::HeaderPair => {
            if let Some(api_key) = connection.api_key() {
                set_sensitive(&mut out, header_name("User-Token")?, api_key)?;
            }
            if let Some(secret) = connection.secret() {
                set_sensitive(&mut out, header_name("User-Secret-Key")?, secret)?;
            }
        }
        AuthScheme::Custom => {
            if let Some(custom) = connection
                .custom_auth
                .as_ref()
                .filter(|c| !c.header_name.is_empty())
            {
                let value = render_template(
                    &custom.header_value_template,
                    connection.api_key(),
                    connection.secret(),
                );
                set_sensitive(&mut out, header_name(&custom.header_name)?, &value)?;
            }
        }
        // Query credentials are added by the target URL builder
        AuthScheme::Query | AuthScheme::None => {}
    }

    for (name, value) in &connection.extra_headers {
        let value = HeaderValue::from_str(value)
            .map_err(|_| InjectError::InvalidHeaderValue(name.clone()))?;
        out.insert(header_name(name)?, value);
    }

    Ok(out)
}

/// Replaces the first `{{apiKey}}` and the first `{{secret}}` verbatim.
/// Absent credentials substitute as empty strings.
pub fn render_template(template: &str, api_key: Option<&str>, secret: Option<&str>) -> String {
    template
        .replacen(API_KEY_PLACEHOLDER, api_key.unwrap_or_default(), 1)
        .replacen(SECRET_PLACEHOLDER, secret.unwrap_or_default(), 1)
}

fn header_name(name: &str) -> Result<HeaderName, InjectError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| InjectError::InvalidHeaderName(name.to_string()))
}

fn set_sensitive(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), InjectError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| InjectError::InvalidHeaderValue(name.to_string()))?;
    value.set_sensitive(true);
    headers.insert(name, value);
    Ok(())
}
