//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        InMemoryConversationStore, OpenAiChatAdapter, PgConversationStore, ReqwestFetcher,
    },
    config::Config,
    error::ApiError,
    web::{router, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use shelf_core::ports::ConversationStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Choose the History Store ---
    let conversations: Arc<dyn ConversationStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let store = PgConversationStore::new(db_pool);
            info!("Running database migrations...");
            store.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(store)
        }
        None => {
            warn!("DATABASE_URL is not set; chat histories are kept in memory only.");
            Arc::new(InMemoryConversationStore::new())
        }
    };

    // --- 3. Initialize Service Adapters ---
    let mut openai_config = OpenAIConfig::new().with_api_key(&config.openai_api_key);
    if let Some(base) = &config.openai_base_url {
        openai_config = openai_config.with_api_base(base);
    }
    let openai_client = Client::with_config(openai_config);
    let chat_model = Arc::new(OpenAiChatAdapter::new(
        openai_client,
        config.chat_model.clone(),
    ));

    let fetcher = Arc::new(ReqwestFetcher::new(
        config.http_timeout,
        config.max_document_bytes,
    )?);

    // --- 4. Build the Shared AppState ---
    let shutdown = CancellationToken::new();
    let app_state = Arc::new(AppState::new(
        config.clone(),
        fetcher,
        chat_model,
        conversations,
        shutdown.clone(),
    ));
    info!(
        chain = ?config.document_chain,
        timeout_secs = config.strategy_timeout.as_secs(),
        "Document resolution configured."
    );

    // --- 5. Create the Web Router ---
    let app = router(app_state);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped.");
    Ok(())
}

/// Waits for Ctrl-C, then cancels every in-flight sequence.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for the shutdown signal: {e}");
        return;
    }
    info!("Shutdown signal received.");
    shutdown.cancel();
}
