use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    Json,
};
use sha2::{Digest, Sha256};

use crate::api::handlers::{ApiError, AppState, ErrorResponse};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Proof that the request carried a valid `x-api-key` header.
///
/// Taking this extractor as a handler argument gates the route: the header
/// value is hashed with SHA-256 and compared against `api.api_key_hash`.
/// With no hash configured every gated request is refused.
#[derive(Debug, Clone, Copy)]
pub struct ApiKey;

#[async_trait]
impl<S> FromRequestParts<AppState<S>> for ApiKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        let Some(key) = extract_header_value(&parts.headers, API_KEY_HEADER) else {
            return Err(unauthorized("Missing x-api-key header"));
        };

        match state.api.api_key_hash.as_deref() {
            Some(expected) if verify_api_key(&key, expected) => Ok(ApiKey),
            _ => {
                log::warn!("Rejected request with an invalid API key");
                Err(unauthorized("Invalid API key"))
            }
        }
    }
}

fn unauthorized(message: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(message)))
}

/// Extract header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}

/// Hex SHA-256 digest of an API key, the form stored in configuration
pub fn hash_api_key(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

fn verify_api_key(secret: &str, expected_hash: &str) -> bool {
    hash_api_key(secret).eq_ignore_ascii_case(expected_hash.trim())
}
