//! services/api/src/web/documents.rs
//!
//! Server-side document resolution and the blob endpoint that serves what
//! the blob and proxy strategies fetched.

use crate::error::HttpError;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use shelf_core::domain::{DocumentFormat, DocumentHandle, ViewerKind};
use shelf_core::ports::{ErrorKind, PortError};
use shelf_core::{DocumentRequest, FailedAttempt, Resolution};
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveRequest {
    pub url: String,
    /// `pdf` or `epub`. Guessed from the URL when omitted.
    #[schema(value_type = Option<String>)]
    pub format: Option<DocumentFormat>,
}

/// One failed step of the chain.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub strategy: String,
    pub kind: String,
    pub error: String,
    pub elapsed_ms: u64,
}

impl From<&FailedAttempt> for AttemptSummary {
    fn from(attempt: &FailedAttempt) -> Self {
        Self {
            strategy: attempt.strategy.clone(),
            kind: attempt.error.kind().as_str().to_string(),
            error: attempt.error.to_string(),
            elapsed_ms: u64::try_from(attempt.elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDocument {
    /// `direct`, `blob` or `external_viewer`.
    pub kind: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer: Option<String>,
    /// `false` when the document was handed to a hosted viewer nobody checked.
    pub verified: bool,
    pub strategy: String,
    pub failed_attempts: Vec<AttemptSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolveFailure {
    pub success: bool,
    pub error: String,
    pub kind: String,
    pub failed_attempts: Vec<AttemptSummary>,
}

fn viewer_name(viewer: ViewerKind) -> &'static str {
    match viewer {
        ViewerKind::GoogleDocs => "google_docs",
        ViewerKind::PdfJs => "pdf_js",
    }
}

impl ResolvedDocument {
    fn new(handle: DocumentHandle, strategy: String, failures: &[FailedAttempt]) -> Self {
        let failed_attempts = failures.iter().map(AttemptSummary::from).collect();
        match handle {
            DocumentHandle::Direct { url } => Self {
                kind: "direct".to_string(),
                url,
                mime_type: None,
                size: None,
                viewer: None,
                verified: true,
                strategy,
                failed_attempts,
            },
            DocumentHandle::Blob {
                url,
                mime_type,
                size,
            } => Self {
                kind: "blob".to_string(),
                url,
                mime_type: Some(mime_type),
                size: Some(size),
                viewer: None,
                verified: true,
                strategy,
                failed_attempts,
            },
            DocumentHandle::ExternalViewer {
                viewer,
                url,
                verified,
            } => Self {
                kind: "external_viewer".to_string(),
                url,
                mime_type: None,
                size: None,
                viewer: Some(viewer_name(viewer).to_string()),
                verified,
                strategy,
                failed_attempts,
            },
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Resolve a document URL into something a viewer can load.
///
/// Runs the configured chain (direct, blob, proxy, hosted viewers) and reports
/// the first handle that worked along with the attempts that failed before it.
#[utoipa::path(
    post,
    path = "/api/documents/resolve",
    request_body = ResolveRequest,
    responses(
        (status = 200, description = "The document was resolved", body = ResolvedDocument),
        (status = 400, description = "Invalid URL", body = crate::error::ErrorBody),
        (status = 502, description = "Every strategy failed", body = ResolveFailure),
        (status = 503, description = "The server is shutting down", body = crate::error::ErrorBody)
    )
)]
pub async fn resolve_document_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResolveRequest>,
) -> Result<Response, HttpError> {
    let request = DocumentRequest::parse(&req.url, req.format)?;
    let cancel = state.shutdown.child_token();

    match state.documents.resolve(&request, &cancel).await {
        Resolution::Resolved {
            value,
            strategy,
            failures,
        } => {
            info!(url = %request.url, %strategy, failed = failures.len(), "Resolved document.");
            Ok(Json(ResolvedDocument::new(value, strategy, &failures)).into_response())
        }
        Resolution::Exhausted {
            last_error,
            failures,
        } => {
            warn!(url = %request.url, error = %last_error, "Every document strategy failed.");
            let body = ResolveFailure {
                success: false,
                error: last_error.to_string(),
                kind: last_error.kind().as_str().to_string(),
                failed_attempts: failures.iter().map(AttemptSummary::from).collect(),
            };
            Ok((StatusCode::BAD_GATEWAY, Json(body)).into_response())
        }
        Resolution::Cancelled { .. } => Err(PortError::Cancelled.into()),
    }
}

/// Serve bytes parked by the blob and proxy strategies.
#[utoipa::path(
    get,
    path = "/api/blobs/{id}",
    params(("id" = Uuid, Path, description = "The blob id from a resolved blob URL.")),
    responses(
        (status = 200, description = "The document bytes"),
        (status = 404, description = "Unknown or evicted blob", body = crate::error::ErrorBody)
    )
)]
pub async fn blob_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Response, HttpError> {
    let blob = state.blobs.get(id).await.ok_or_else(|| {
        HttpError::new(
            StatusCode::NOT_FOUND,
            ErrorKind::NotFound,
            format!("blob {id} not found"),
        )
    })?;
    Ok(([(header::CONTENT_TYPE, blob.mime_type)], blob.bytes).into_response())
}
