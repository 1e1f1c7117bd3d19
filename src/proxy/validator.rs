//! Fail-fast access checks run before anything is sent upstream.
//!
//! Checks run in a fixed order and the first failure wins:
//! token format, token lookup, client status, connection lookup,
//! connection status, client authorization, method, path. The path check
//! rejects dot segments before matching allowed prefixes.

use tracing::{debug, warn};

use super::errors::{GatewayError, ProxyErrorKind};
use super::request::ProxyRequest;
use super::store::ProxyStore;
use crate::models::{Client, Connection, CLIENT_TOKEN_PREFIX};

/// Identities resolved for a request that passed every check
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub client: Client,
    pub connection: Connection,
}

pub async fn validate<S: ProxyStore + ?Sized>(
    store: &S,
    request: &ProxyRequest,
    client_token: &str,
) -> Result<ValidatedRequest, GatewayError> {
    if !has_token_format(client_token) {
        return Err(GatewayError::new(ProxyErrorKind::Unauthorized));
    }

    let client = match store.get_client_by_token(client_token).await {
        Ok(Some(client)) => client,
        Ok(None) => return Err(GatewayError::new(ProxyErrorKind::Unauthorized)),
        Err(e) => {
            warn!("Client lookup failed: {}", e);
            return Err(GatewayError::new(ProxyErrorKind::Unauthorized));
        }
    };

    if !client.enabled {
        return Err(GatewayError::new(ProxyErrorKind::ClientDisabled));
    }

    let connection = match store.get_connection_by_id(&request.connection_id).await {
        Ok(Some(connection)) => connection,
        Ok(None) => return Err(GatewayError::new(ProxyErrorKind::ConnectionNotFound)),
        Err(e) => {
            warn!(
                "Connection lookup failed for {}: {}",
                request.connection_id, e
            );
            return Err(GatewayError::new(ProxyErrorKind::ConnectionNotFound));
        }
    };

    if !connection.enabled {
        return Err(GatewayError::new(ProxyErrorKind::ConnectionDisabled));
    }

    if !client.may_use(&request.connection_id) {
        return Err(GatewayError::new(ProxyErrorKind::Forbidden));
    }

    if !method_allowed(&connection, &request.method) {
        return Err(GatewayError::with_detail(
            ProxyErrorKind::MethodNotAllowed,
            request.method.to_uppercase(),
        ));
    }

    if has_dot_segment(&request.path) || !path_allowed(&connection, &request.path) {
        return Err(GatewayError::with_detail(
            ProxyErrorKind::PathNotAllowed,
            &request.path,
        ));
    }

    debug!(
        "Request validated: client={} connection={}",
        client.id, connection.id
    );

    Ok(ValidatedRequest { client, connection })
}

fn has_token_format(token: &str) -> bool {
    !token.is_empty() && token.starts_with(CLIENT_TOKEN_PREFIX)
}

/// Empty allow-list admits every method; comparison is on uppercased names
pub fn method_allowed(connection: &Connection, method: &str) -> bool {
    if connection.allowed_methods.is_empty() {
        return true;
    }
    let method = method.to_uppercase();
    connection
        .allowed_methods
        .iter()
        .any(|allowed| allowed.to_uppercase() == method)
}

/// Whether the path holds a `.` or `..` segment, literal or percent-encoded.
///
/// The outbound URL is normalized before it is sent, so such a path would be
/// checked against the prefix allow-list in one form and reach upstream in
/// another. Backslashes count as separators for http(s) URLs.
pub fn has_dot_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| {
        let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
        decoded == "." || decoded == ".."
    })
}

/// Empty allow-list admits every path; prefixes match literally
pub fn path_allowed(connection: &Connection, path: &str) -> bool {
    connection.allowed_path_prefixes.is_empty()
        || connection
            .allowed_path_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
}
