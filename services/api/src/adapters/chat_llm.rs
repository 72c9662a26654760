//! services/api/src/adapters/chat_llm.rs
//!
//! This module contains the adapter for the chat completion LLM.
//! It implements the `ChatModelService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImage, ChatCompletionRequestMessageContentPartText,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use shelf_core::domain::{ChatMessage, ChatRole};
use shelf_core::ports::{ChatModelService, PortError, PortResult};

const SYSTEM_INSTRUCTIONS: &str = "You are a friendly study assistant for an online bookstore. \
Help readers with questions about books, authors, study techniques and the documents they are \
reading. Keep answers conversational and reasonably concise. If an image is attached, describe \
what is relevant to the question before answering.";

//=========================================================================================
// Error Classification
//=========================================================================================

/// Tags an OpenAI API error by its reported type.
pub fn classify_api_error(error_type: Option<&str>, message: &str) -> PortError {
    let lowered = message.to_ascii_lowercase();
    match error_type.unwrap_or_default() {
        "authentication_error" | "permission_error" => PortError::Unauthorized(message.to_string()),
        "invalid_request_error" | "invalid_argument" if lowered.contains("api key") => {
            PortError::Unauthorized(message.to_string())
        }
        "invalid_request_error" | "invalid_argument" => PortError::InvalidArgument(message.to_string()),
        "rate_limit_error" | "requests" | "tokens" => PortError::HttpStatus {
            status: 429,
            detail: message.to_string(),
        },
        "server_error" => PortError::HttpStatus {
            status: 500,
            detail: message.to_string(),
        },
        _ => PortError::Unexpected(message.to_string()),
    }
}

fn classify(error: OpenAIError) -> PortError {
    match error {
        OpenAIError::ApiError(api) => classify_api_error(api.r#type.as_deref(), &api.message),
        e @ OpenAIError::Reqwest(..) => PortError::Network(e.to_string()),
        e @ OpenAIError::JSONDeserialize(..) => PortError::Parse(e.to_string()),
        e @ OpenAIError::InvalidArgument(..) => PortError::InvalidArgument(e.to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ChatModelService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiChatAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiChatAdapter {
    /// Creates a new `OpenAiChatAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    fn to_request_message(message: &ChatMessage) -> PortResult<ChatCompletionRequestMessage> {
        match message.role {
            ChatRole::Model => Ok(ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.text())
                .build()
                .map_err(classify)?
                .into()),
            ChatRole::User => {
                let images: Vec<_> = message.inline_data().collect();
                let builder = if images.is_empty() {
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(message.text())
                        .build()
                } else {
                    let mut parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText {
                            text: message.text(),
                        },
                    )];
                    parts.extend(images.into_iter().map(|image| {
                        ChatCompletionRequestUserMessageContentPart::ImageUrl(
                            ChatCompletionRequestMessageContentPartImage {
                                image_url: ImageUrl {
                                    url: format!("data:{};base64,{}", image.mime_type, image.data),
                                    detail: None,
                                },
                            },
                        )
                    }));
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(ChatCompletionRequestUserMessageContent::Array(parts))
                        .build()
                };
                Ok(builder.map_err(classify)?.into())
            }
        }
    }

    async fn send(&self, mut messages: Vec<ChatCompletionRequestMessage>) -> PortResult<String> {
        messages.insert(
            0,
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(classify)?
                .into(),
        );

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(classify)?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self.client.chat().create(request).await.map_err(classify)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PortError::Parse("chat LLM response contained no text content".to_string()))
    }
}

//=========================================================================================
// `ChatModelService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ChatModelService for OpenAiChatAdapter {
    async fn continue_conversation(
        &self,
        history: &[ChatMessage],
        message: &ChatMessage,
    ) -> PortResult<String> {
        let messages = history
            .iter()
            .chain(std::iter::once(message))
            .map(Self::to_request_message)
            .collect::<PortResult<Vec<_>>>()?;
        self.send(messages).await
    }

    async fn complete(&self, prompt: &str) -> PortResult<String> {
        let message: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(classify)?
            .into();
        self.send(vec![message]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::ports::ErrorKind;

    #[test]
    fn api_errors_are_tagged_by_type() {
        assert_eq!(
            classify_api_error(Some("invalid_request_error"), "messages[3] is malformed").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            classify_api_error(Some("invalid_request_error"), "Incorrect API key provided").kind(),
            ErrorKind::Auth
        );
        assert_eq!(
            classify_api_error(Some("rate_limit_error"), "slow down"),
            PortError::HttpStatus {
                status: 429,
                detail: "slow down".to_string()
            }
        );
        assert_eq!(classify_api_error(None, "???").kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn history_maps_to_request_messages() {
        let user = OpenAiChatAdapter::to_request_message(&ChatMessage::user_text("hi")).unwrap();
        assert!(matches!(user, ChatCompletionRequestMessage::User(_)));
        let model = OpenAiChatAdapter::to_request_message(&ChatMessage::model_text("hello")).unwrap();
        assert!(matches!(model, ChatCompletionRequestMessage::Assistant(_)));
    }
}
