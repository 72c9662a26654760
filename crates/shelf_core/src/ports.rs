//! crates/shelf_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like HTTP clients,
//! databases or LLM APIs.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;

use crate::domain::{ChatMessage, Conversation, FetchedBody, ProbeResponse};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The coarse classification of a [`PortError`].
///
/// The sequencer decides whether to advance or halt based on this value alone,
/// so adapters must tag errors at the boundary where they are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    HttpStatus,
    Parse,
    UnsupportedFormat,
    Auth,
    InvalidArgument,
    NotFound,
    Timeout,
    Cancelled,
    Unexpected,
}

impl ErrorKind {
    /// The stable snake_case name used in logs and JSON payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Parse => "parse",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::Auth => "auth",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic error type for all port operations and strategy attempts.
/// This abstracts away the specific errors from external services (e.g., network, LLM).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Upstream responded with HTTP {status}: {detail}")]
    HttpStatus { status: u16, detail: String },
    #[error("Could not parse response: {0}")]
    Parse(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Timed out after {0} ms")]
    Timeout(u64),
    #[error("Cancelled")]
    Cancelled,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PortError::Network(_) => ErrorKind::Network,
            PortError::HttpStatus { .. } => ErrorKind::HttpStatus,
            PortError::Parse(_) => ErrorKind::Parse,
            PortError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            PortError::Unauthorized(_) => ErrorKind::Auth,
            PortError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            PortError::NotFound(_) => ErrorKind::NotFound,
            PortError::Timeout(_) => ErrorKind::Timeout,
            PortError::Cancelled => ErrorKind::Cancelled,
            PortError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }

    /// Classifies a non-success HTTP status. 401 and 403 are auth failures,
    /// everything else keeps its status code.
    pub fn from_status(status: u16, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match status {
            401 | 403 => PortError::Unauthorized(format!("HTTP {status}: {detail}")),
            _ => PortError::HttpStatus { status, detail },
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// One way of acquiring a resource of type `T`.
///
/// Implementations must not mutate state shared with other strategies; the only
/// observable effect of a success is the value handed back to the sequencer.
#[async_trait]
pub trait Strategy<T>: Send + Sync {
    /// A short, stable name used in logs and attempt ledgers.
    fn name(&self) -> &str;

    async fn attempt(&self) -> PortResult<T>;
}

/// Outbound HTTP used by the document strategies.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Issues a HEAD request. Non-2xx statuses are returned, not turned into errors.
    async fn probe(&self, url: &str, origin: Option<&str>) -> PortResult<ProbeResponse>;

    /// Issues a GET request and buffers the body. Non-2xx statuses are errors.
    async fn fetch(
        &self,
        url: &str,
        origin: Option<&str>,
        bearer_token: Option<&str>,
    ) -> PortResult<FetchedBody>;
}

/// Somewhere to park fetched document bytes so the client can load them by reference.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the bytes and returns the URL the client should load them from.
    async fn put(&self, bytes: Bytes, mime_type: &str) -> PortResult<String>;
}

#[async_trait]
pub trait ChatModelService: Send + Sync {
    /// Continues a multi-turn session: `history` is the accumulated conversation,
    /// `message` the new user turn.
    async fn continue_conversation(
        &self,
        history: &[ChatMessage],
        message: &ChatMessage,
    ) -> PortResult<String>;

    /// A stateless single-shot completion.
    async fn complete(&self, prompt: &str) -> PortResult<String>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn load(&self, user_id: &str) -> PortResult<Option<Conversation>>;

    /// Replaces the whole stored conversation (upsert, last writer wins).
    async fn save(&self, conversation: &Conversation) -> PortResult<()>;
}
