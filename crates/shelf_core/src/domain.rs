//! crates/shelf_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! The chat types mirror the Gemini wire shape so stored histories can be
//! handed back to the browser unchanged.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Documents
//=========================================================================================

/// The document formats the viewers can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Epub,
}

const EPUB_MIMETYPE_ENTRY: &[u8] = b"mimetypeapplication/epub+zip";

impl DocumentFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Epub => "application/epub+zip",
        }
    }

    /// Guesses the format from the path of a URL, defaulting to PDF.
    pub fn from_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        if path.to_ascii_lowercase().ends_with(".epub") {
            DocumentFormat::Epub
        } else {
            DocumentFormat::Pdf
        }
    }

    /// Returns `true` when a `Content-Type` header value is compatible with this format.
    ///
    /// A missing header or `application/octet-stream` is accepted; the bytes decide.
    pub fn accepts_content_type(&self, content_type: Option<&str>) -> bool {
        let Some(value) = content_type else {
            return true;
        };
        let essence = value.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        essence.is_empty() || essence == "application/octet-stream" || essence == self.mime_type()
    }

    /// Checks the magic bytes of a buffered document.
    pub fn matches_bytes(&self, bytes: &[u8]) -> bool {
        match self {
            DocumentFormat::Pdf => bytes.starts_with(b"%PDF-"),
            DocumentFormat::Epub => {
                bytes.starts_with(b"PK\x03\x04")
                    && bytes.len() >= 30 + EPUB_MIMETYPE_ENTRY.len()
                    && &bytes[30..30 + EPUB_MIMETYPE_ENTRY.len()] == EPUB_MIMETYPE_ENTRY
            }
        }
    }

    /// Detects the format of a buffer, if it is one we know.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        [DocumentFormat::Pdf, DocumentFormat::Epub]
            .into_iter()
            .find(|format| format.matches_bytes(bytes))
    }
}

/// Hosted third-party viewers a document URL can be handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerKind {
    GoogleDocs,
    PdfJs,
}

/// A resolved, viewable reference to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentHandle {
    /// The original URL can be loaded by the viewer as-is.
    Direct { url: String },
    /// The bytes were fetched and parked in a blob store.
    Blob {
        url: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
        size: usize,
    },
    /// The document is shown by a hosted viewer. Nothing checks that it renders.
    ExternalViewer {
        viewer: ViewerKind,
        url: String,
        verified: bool,
    },
}

impl DocumentHandle {
    pub fn url(&self) -> &str {
        match self {
            DocumentHandle::Direct { url }
            | DocumentHandle::Blob { url, .. }
            | DocumentHandle::ExternalViewer { url, .. } => url,
        }
    }
}

/// The headers of a HEAD probe that matter to the viewers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub allow_origin: Option<String>,
}

/// A fully buffered successful GET.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub bytes: Bytes,
    pub content_type: Option<String>,
    pub allow_origin: Option<String>,
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// Base64 payload attached to a message, e.g. an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub parts: Vec<MessagePart>,
}

impl ChatMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    /// The text parts joined by newlines. Inline data is skipped.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::InlineData { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn inline_data(&self) -> impl Iterator<Item = &InlineData> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::InlineData { inline_data } => Some(inline_data),
            MessagePart::Text { .. } => None,
        })
    }
}

/// The stored chat history of one (possibly anonymous) user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub user_id: String,
    pub messages: Vec<ChatMessage>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

//=========================================================================================
// Cart
//=========================================================================================

/// One line of a shopping cart, as mirrored in the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub price: f64,
    #[serde(rename = "coverimage")]
    pub cover_image: String,
    pub quantity: u32,
}
