//! Shared-secret webhook authentication middleware

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use serde_json::json;
use subtle::ConstantTimeEq;

use super::ApiState;

/// Extract the raw Authorization header
fn extract_authorization(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
}

/// Compare the header against `Basic <secret>` in constant time
fn secret_matches(header: &str, secret: &str) -> bool {
    header
        .strip_prefix("Basic ")
        .is_some_and(|provided| bool::from(provided.as_bytes().ct_eq(secret.as_bytes())))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response()
}

/// Middleware requiring `Authorization: Basic <secret>`
pub async fn require_webhook_secret(
    State(state): State<Arc<ApiState>>,
    req: Request,
    next: Next,
) -> Response {
    // If no secret configured, allow all requests (development mode)
    let Some(secret) = &state.webhook_secret else {
        tracing::warn!("webhook secret not configured - allowing unauthenticated access");
        return next.run(req).await;
    };

    match extract_authorization(&req) {
        Some(value) if secret_matches(value, secret.expose_secret()) => next.run(req).await,
        Some(_) => {
            tracing::warn!("invalid Authorization header");
            unauthorized()
        }
        None => {
            tracing::warn!("missing Authorization header");
            unauthorized()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_authorization() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(extract_authorization(&req), None);

        req.headers_mut()
            .insert("authorization", HeaderValue::from_static("Basic s3cret"));
        assert_eq!(extract_authorization(&req), Some("Basic s3cret"));
    }

    #[test]
    fn test_secret_matches_only_exact_basic_value() {
        assert!(secret_matches("Basic s3cret", "s3cret"));
        assert!(!secret_matches("Basic s3cre", "s3cret"));
        assert!(!secret_matches("Basic s3cret!", "s3cret"));
        assert!(!secret_matches("Bearer s3cret", "s3cret"));
        assert!(!secret_matches("s3cret", "s3cret"));
    }
}
