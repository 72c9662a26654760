//! services/api/src/web/middleware.rs
//!
//! Bearer-token middleware for the PDF proxy.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use shelf_core::ports::ErrorKind;
use std::sync::Arc;
use tracing::warn;

use crate::error::HttpError;
use crate::web::state::AppState;

/// Middleware that checks `Authorization: Bearer <token>` against `PROXY_API_TOKEN`.
///
/// When no token is configured every request passes through.
pub async fn require_proxy_token(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let Some(expected) = state.config.proxy_api_token.as_deref() else {
        return Ok(next.run(req).await);
    };

    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if token == expected => Ok(next.run(req).await),
        Some(_) => {
            warn!("Rejected proxy request with an invalid token.");
            Err(unauthorized("invalid proxy token"))
        }
        None => Err(unauthorized("missing proxy token")),
    }
}

fn unauthorized(message: &str) -> HttpError {
    HttpError::new(StatusCode::UNAUTHORIZED, ErrorKind::Auth, message)
}
