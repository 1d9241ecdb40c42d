//! Admin key guard.
//!
//! Rider-facing routes are open; slot management, catalog and user
//! administration require the pre-shared admin key.

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppErrorWithRevision};

/// Header name for the admin key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject the request unless it carries the admin key.
///
/// With no key configured every request passes (development mode).
pub async fn admin_key_layer(expected_key: Option<String>, request: Request, next: Next) -> Response {
    let Some(expected) = expected_key else {
        return next.run(request).await;
    };

    let rejection = match presented_key(request.headers()) {
        Some(key) if keys_match(key, &expected) => None,
        Some(_) => Some("Invalid admin key"),
        None => Some("Admin key required"),
    };

    match rejection {
        None => next.run(request).await,
        Some(message) => unauthorized(message),
    }
}

/// Key from `x-api-key`, or a bearer token when that header is absent.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(API_KEY_HEADER) {
        return value.to_str().ok();
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

fn keys_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn unauthorized(message: &str) -> Response {
    AppErrorWithRevision {
        error: AppError::Unauthorized(message.to_string()),
        revision_id: 0,
    }
    .into_response()
}
