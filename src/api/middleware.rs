/// Operator authentication for administrative routes
use crate::{
    context::AppContext,
    error::{KeyringError, KeyringResult},
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Require the configured admin token, or return 401
pub async fn require_admin(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> KeyringResult<Response> {
    let Some(expected) = ctx.config.admin.token.as_deref() else {
        return Err(KeyringError::Authentication(
            "Admin routes are disabled".to_string(),
        ));
    };

    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| KeyringError::Authentication("Missing authorization header".to_string()))?;

    // Compare digests so the comparison does not short-circuit on the secret
    if Sha256::digest(token.as_bytes()) != Sha256::digest(expected.as_bytes()) {
        return Err(KeyringError::Authentication("Invalid admin token".to_string()));
    }

    Ok(next.run(request).await)
}
