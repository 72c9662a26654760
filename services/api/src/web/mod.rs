pub mod chat;
pub mod documents;
pub mod middleware;
pub mod pdf;
pub mod rest;
pub mod state;

pub use chat::{chat_handler, history_handler};
pub use documents::{blob_handler, resolve_document_handler};
pub use middleware::require_proxy_token;
pub use pdf::{fetch_pdf_handler, signed_url_handler};

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use rest::ApiDoc;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Builds the complete application router, Swagger UI included.
pub fn router(app_state: Arc<AppState>) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);
    match app_state.config.client_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => warn!(
            origin = %app_state.config.client_origin,
            "CLIENT_ORIGIN is not a valid header value; cross-origin requests will be refused."
        ),
    }

    // The proxy is the only route that can be locked behind a token.
    let proxy_routes = Router::new()
        .route("/api/pdf/fetch-pdf", get(fetch_pdf_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_proxy_token,
        ));

    let public_routes = Router::new()
        .route("/api/pdf/signed-url", get(signed_url_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/history/{user_id}", get(history_handler))
        .route("/api/documents/resolve", post(resolve_document_handler))
        .route("/api/blobs/{id}", get(blob_handler));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(proxy_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
