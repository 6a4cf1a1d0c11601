// src/utils/guard.rs

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{config::Config, error::AppError};

/// Axum Middleware: Admin Authorization.
///
/// Compares the `Authorization: Bearer <token>` header with the configured
/// admin token. When no token is configured the routes are left open.
pub async fn admin_middleware(
    State(config): State<Config>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = config.admin_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if token_matches(token, expected) => Ok(next.run(req).await),
        _ => {
            tracing::warn!("Rejected admin request to {}", req.uri().path());
            Err(AppError::Unauthorized(
                "Missing or invalid admin token".to_string(),
            ))
        }
    }
}

/// Constant time over the bytes; only the length can leak.
fn token_matches(presented: &str, expected: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
