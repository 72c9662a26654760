//! services/api/src/web/pdf.rs
//!
//! The server-side document proxy. Browsers that cannot read a document
//! cross-origin load it through here instead.

use crate::error::HttpError;
use crate::web::state::AppState;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use shelf_core::document::{parse_source_url, proxy_url};
use shelf_core::domain::DocumentFormat;
use shelf_core::ports::{ErrorKind, PortError};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

//=========================================================================================
// API Payload Structs
//=========================================================================================

#[derive(Debug, Deserialize, IntoParams)]
pub struct SourceQuery {
    /// Absolute http(s) URL of the document.
    pub url: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub success: bool,
    pub signed_url: String,
}

/// Upstream refusals are reported as gateway failures so they are not mistaken
/// for a rejected proxy token.
fn upstream_error(error: PortError) -> HttpError {
    match error.kind() {
        kind @ (ErrorKind::Auth | ErrorKind::NotFound) => {
            HttpError::new(StatusCode::BAD_GATEWAY, kind, error.to_string())
        }
        _ => HttpError::from(error),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Fetch a document on the client's behalf and return its bytes.
#[utoipa::path(
    get,
    path = "/api/pdf/fetch-pdf",
    params(SourceQuery),
    responses(
        (status = 200, description = "The document bytes", content_type = "application/pdf"),
        (status = 400, description = "Missing or invalid URL", body = crate::error::ErrorBody),
        (status = 401, description = "Missing or invalid proxy token", body = crate::error::ErrorBody),
        (status = 502, description = "The upstream request failed", body = crate::error::ErrorBody),
        (status = 504, description = "The upstream request timed out", body = crate::error::ErrorBody)
    ),
    security(("proxy_token" = []))
)]
pub async fn fetch_pdf_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SourceQuery>,
) -> Result<Response, HttpError> {
    let source = parse_source_url(query.url.as_deref().unwrap_or_default())?;
    let cancel = state.shutdown.child_token();

    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PortError::Cancelled),
        fetched = state.fetcher.fetch(source.as_str(), None, None) => fetched,
    };
    let body = fetched.map_err(|e| {
        warn!(url = %source, error = %e, "Proxy fetch failed.");
        upstream_error(e)
    })?;

    let format = DocumentFormat::sniff(&body.bytes).unwrap_or(DocumentFormat::Pdf);
    info!(url = %source, size = body.bytes.len(), mime = format.mime_type(), "Proxied document.");

    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type()),
            (header::CONTENT_DISPOSITION, "inline"),
            (header::CACHE_CONTROL, "private, max-age=300"),
        ],
        body.bytes,
    )
        .into_response())
}

/// Return the same-origin proxy URL a viewer should load a document from.
#[utoipa::path(
    get,
    path = "/api/pdf/signed-url",
    params(SourceQuery),
    responses(
        (status = 200, description = "The proxy URL", body = SignedUrlResponse),
        (status = 400, description = "Missing or invalid URL", body = crate::error::ErrorBody)
    )
)]
pub async fn signed_url_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SourceQuery>,
) -> Result<Json<SignedUrlResponse>, HttpError> {
    let source = parse_source_url(query.url.as_deref().unwrap_or_default())?;
    let signed = proxy_url(&state.config.public_base_url, source.as_str())?;
    Ok(Json(SignedUrlResponse {
        success: true,
        signed_url: signed.into(),
    }))
}
