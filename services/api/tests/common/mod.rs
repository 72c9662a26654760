//! Shared fixtures for the service integration tests.
#![allow(dead_code)]

use api_lib::adapters::{InMemoryConversationStore, ReqwestFetcher};
use api_lib::config::Config;
use api_lib::web::{router, state::AppState};
use async_trait::async_trait;
use axum::Router;
use shelf_core::domain::ChatMessage;
use shelf_core::ports::{ChatModelService, PortResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PDF_BYTES: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF";

pub fn config(pairs: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    vars.entry("OPENAI_API_KEY".to_string())
        .or_insert_with(|| "sk-test".to_string());
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn fetcher() -> Arc<ReqwestFetcher> {
    Arc::new(ReqwestFetcher::new(Duration::from_secs(5), 1024 * 1024).unwrap())
}

/// A chat model whose two entry points return fixed results and record what they saw.
pub struct FakeModel {
    pub session: PortResult<String>,
    pub single: PortResult<String>,
    pub turns: Mutex<Vec<ChatMessage>>,
}

impl FakeModel {
    pub fn new(session: PortResult<String>, single: PortResult<String>) -> Arc<Self> {
        Arc::new(Self {
            session,
            single,
            turns: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatModelService for FakeModel {
    async fn continue_conversation(
        &self,
        _history: &[ChatMessage],
        message: &ChatMessage,
    ) -> PortResult<String> {
        self.turns.lock().unwrap().push(message.clone());
        self.session.clone()
    }

    async fn complete(&self, _prompt: &str) -> PortResult<String> {
        self.single.clone()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
}

pub fn app(config: Config, model: Arc<FakeModel>) -> TestApp {
    let fetcher = Arc::new(
        ReqwestFetcher::new(config.http_timeout, config.max_document_bytes).unwrap(),
    );
    let state = Arc::new(AppState::new(
        Arc::new(config),
        fetcher,
        model,
        Arc::new(InMemoryConversationStore::new()),
        CancellationToken::new(),
    ));
    TestApp {
        router: router(state.clone()),
        state,
    }
}

/// `path?url=<source>` with the source percent-encoded.
pub fn with_source(path: &str, source: &str) -> String {
    let url = url::Url::parse_with_params(&format!("http://localhost{path}"), &[("url", source)])
        .unwrap();
    format!("{}?{}", url.path(), url.query().unwrap_or_default())
}
