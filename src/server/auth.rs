use axum::http::HeaderMap;

use crate::error::GatewayError;

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Inbound requests must carry the gateway's own api key; everything else is
/// rejected before any upstream work happens.
pub fn verify_bearer(headers: &HeaderMap, api_key: &str) -> Result<(), GatewayError> {
    match bearer_token(headers) {
        Some(token) if token == api_key => Ok(()),
        Some(_) => Err(GatewayError::Unauthorized("invalid api key".into())),
        None => Err(GatewayError::Unauthorized("missing bearer token".into())),
    }
}
