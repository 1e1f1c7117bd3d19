use rand::Rng;

use crate::models::CLIENT_TOKEN_PREFIX;

const TOKEN_BODY_LEN: usize = 32;

/// New client token: the `ab_` prefix followed by 32 alphanumeric characters
pub fn generate_client_token() -> String {
    let body: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(TOKEN_BODY_LEN)
        .map(char::from)
        .collect();
    format!("{}{}", CLIENT_TOKEN_PREFIX, body)
}
