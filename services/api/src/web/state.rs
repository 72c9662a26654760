//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::adapters::BlobCache;
use crate::config::Config;
use shelf_core::ports::{ChatModelService, ConversationStore, DocumentFetcher};
use shelf_core::{ChatResponder, DocumentResolver};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub blobs: Arc<BlobCache>,
    pub conversations: Arc<dyn ConversationStore>,
    pub documents: DocumentResolver,
    pub chat: ChatResponder,
    /// Cancelled on shutdown. Every request runs its sequence under a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires the document resolver and chat responder from the configured adapters.
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn DocumentFetcher>,
        model: Arc<dyn ChatModelService>,
        conversations: Arc<dyn ConversationStore>,
        shutdown: CancellationToken,
    ) -> Self {
        let blobs = Arc::new(BlobCache::new(
            config.blob_cache_capacity,
            config.public_base_url.clone(),
        ));

        let documents = DocumentResolver::new(fetcher.clone(), blobs.clone())
            .with_chain(config.document_chain.clone())
            .with_client_origin(config.client_origin.clone())
            .with_proxy(config.public_base_url.clone(), config.proxy_api_token.clone())
            .with_attempt_timeout(config.strategy_timeout);

        let chat = ChatResponder::new(model, conversations.clone())
            .with_transcript_turns(config.transcript_turns)
            .with_attempt_timeout(config.strategy_timeout);

        Self {
            config,
            fetcher,
            blobs,
            conversations,
            documents,
            chat,
            shutdown,
        }
    }
}
