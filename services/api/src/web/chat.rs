//! services/api/src/web/chat.rs
//!
//! The chat endpoint and the history lookup. A turn may arrive as JSON or as
//! `multipart/form-data` when the browser uploads an image file.

use crate::error::HttpError;
use crate::web::state::AppState;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use shelf_core::domain::{ChatMessage, ChatRole, InlineData, MessagePart};
use shelf_core::ports::ErrorKind;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

//=========================================================================================
// API Request and Response Structs
//=========================================================================================

/// A chat turn. `prompt` is accepted as an alias of `message`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: Option<String>,
    pub message: Option<String>,
    pub prompt: Option<String>,
    /// A `data:` URL or raw base64.
    pub image: Option<String>,
    pub image_mime_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub user_id: String,
    /// Which step of the chat chain produced the reply.
    pub strategy: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub user_id: String,
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<ChatMessage>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

//=========================================================================================
// Request Decoding
//=========================================================================================

/// Splits a `data:<mime>;base64,<payload>` URL; anything else is taken as raw base64.
fn split_data_url(raw: &str) -> (Option<&str>, &str) {
    let Some(rest) = raw.strip_prefix("data:") else {
        return (None, raw);
    };
    match rest.split_once(',') {
        Some((meta, payload)) => {
            let mime = meta.strip_suffix(";base64").unwrap_or(meta);
            (Some(mime).filter(|m| !m.is_empty()), payload)
        }
        None => (None, rest),
    }
}

fn decode_image(raw: &str, mime_hint: Option<&str>) -> Result<InlineData, HttpError> {
    let (mime, payload) = split_data_url(raw.trim());
    let payload = payload.trim();
    STANDARD
        .decode(payload)
        .map_err(|e| HttpError::bad_request(format!("image is not valid base64: {e}")))?;
    Ok(InlineData {
        mime_type: mime.or(mime_hint).unwrap_or(DEFAULT_IMAGE_MIME).to_string(),
        data: payload.to_string(),
    })
}

impl ChatRequest {
    fn into_turn(self) -> Result<(Option<String>, ChatMessage), HttpError> {
        let text = self
            .message
            .filter(|m| !m.trim().is_empty())
            .or(self.prompt)
            .unwrap_or_default();

        let mut parts = Vec::new();
        if !text.trim().is_empty() {
            parts.push(MessagePart::Text { text });
        }
        if let Some(image) = self.image.filter(|i| !i.trim().is_empty()) {
            parts.push(MessagePart::InlineData {
                inline_data: decode_image(&image, self.image_mime_type.as_deref())?,
            });
        }
        Ok((
            self.user_id,
            ChatMessage {
                role: ChatRole::User,
                parts,
            },
        ))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<ChatRequest, HttpError> {
    let mut request = ChatRequest::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::bad_request(format!("Failed to read multipart data: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let mime = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| HttpError::bad_request(format!("Failed to read image bytes: {e}")))?;
            if !bytes.is_empty() {
                request.image = Some(STANDARD.encode(&bytes));
                request.image_mime_type = mime;
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| HttpError::bad_request(format!("Failed to read field '{name}': {e}")))?;
        match name.as_str() {
            "userId" => request.user_id = Some(value),
            "message" => request.message = Some(value),
            "prompt" => request.prompt = Some(value),
            "imageMimeType" => request.image_mime_type = Some(value),
            _ => {}
        }
    }
    Ok(request)
}

async fn read_chat_request(request: Request) -> Result<ChatRequest, HttpError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| HttpError::bad_request(e.body_text()))?;
        read_multipart(multipart).await
    } else {
        let Json(body) = Json::<ChatRequest>::from_request(request, &())
            .await
            .map_err(|e| HttpError::bad_request(e.body_text()))?;
        Ok(body)
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Answer one chat turn.
///
/// The reply comes from the first step of the chain that succeeds: the
/// multi-turn session, a single-shot transcript prompt, or a fixed apology.
#[utoipa::path(
    post,
    path = "/api/chat",
    request_body(
        content = ChatRequest,
        description = "The user's message and an optional image. The same fields may be sent as multipart/form-data with `image` as a file part."
    ),
    responses(
        (status = 200, description = "The assistant's reply", body = ChatResponse),
        (status = 400, description = "Neither a message nor an image was given", body = crate::error::ErrorBody)
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ChatResponse>, HttpError> {
    let (user_id, message) = read_chat_request(request).await?.into_turn()?;
    let cancel = state.shutdown.child_token();

    let reply = state
        .chat
        .respond(user_id, message, &cancel)
        .await
        .map_err(|e| {
            error!(error = %e, "Chat turn failed.");
            HttpError::from(e)
        })?;
    info!(user_id = %reply.user_id, strategy = %reply.strategy, persisted = reply.persisted, "Answered chat turn.");

    Ok(Json(ChatResponse {
        response: reply.response,
        user_id: reply.user_id,
        strategy: reply.strategy,
    }))
}

/// Return the stored conversation of a user.
#[utoipa::path(
    get,
    path = "/api/chat/history/{user_id}",
    params(("user_id" = String, Path, description = "The id returned by `/api/chat`.")),
    responses(
        (status = 200, description = "The conversation", body = HistoryResponse),
        (status = 404, description = "No history for this user", body = crate::error::ErrorBody)
    )
)]
pub async fn history_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<HistoryResponse>, HttpError> {
    let conversation = state.conversations.load(&user_id).await?.ok_or_else(|| {
        HttpError::new(
            StatusCode::NOT_FOUND,
            ErrorKind::NotFound,
            format!("no chat history for '{user_id}'"),
        )
    })?;
    Ok(Json(HistoryResponse {
        user_id: conversation.user_id,
        messages: conversation.messages,
        updated_at: conversation.updated_at,
    }))
}
