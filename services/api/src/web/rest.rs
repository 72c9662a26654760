//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use crate::error::ErrorBody;
use crate::web::{chat, documents, pdf};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        pdf::fetch_pdf_handler,
        pdf::signed_url_handler,
        chat::chat_handler,
        chat::history_handler,
        documents::resolve_document_handler,
        documents::blob_handler,
    ),
    components(
        schemas(
            ErrorBody,
            pdf::SignedUrlResponse,
            chat::ChatRequest,
            chat::ChatResponse,
            chat::HistoryResponse,
            documents::ResolveRequest,
            documents::ResolvedDocument,
            documents::ResolveFailure,
            documents::AttemptSummary,
        )
    ),
    modifiers(&ProxyTokenAddon),
    tags(
        (name = "Shelf API", description = "Document resolution, the PDF proxy and the reading chat assistant.")
    )
)]
pub struct ApiDoc;

/// Registers the bearer scheme used by the PDF proxy.
struct ProxyTokenAddon;

impl Modify for ProxyTokenAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "proxy_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
