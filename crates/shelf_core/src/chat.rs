//! crates/shelf_core/src/chat.rs
//!
//! The chat completion chain: a stateful multi-turn session first, then a
//! single-shot completion over a flattened transcript, then a static apology.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{ChatMessage, ChatRole, Conversation};
use crate::ports::{ChatModelService, ConversationStore, PortError, PortResult, Strategy};
use crate::sequencer::{FallbackSequencer, FnStrategy, Resolution};

pub const APOLOGY: &str =
    "I'm sorry, I'm having trouble responding right now. Please try again in a moment.";
pub const APOLOGY_STRATEGY: &str = "static_apology";
pub const DEFAULT_TRANSCRIPT_TURNS: usize = 6;

fn non_empty(reply: String) -> PortResult<String> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        Err(PortError::Parse("model returned an empty reply".to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Flattens the last `turns` messages plus the new one into a plain-text prompt.
///
/// Only text parts survive; inline data is dropped.
pub fn flatten_transcript(history: &[ChatMessage], message: &ChatMessage, turns: usize) -> String {
    let start = history.len().saturating_sub(turns);
    let mut prompt = String::new();
    for entry in history[start..].iter().chain(std::iter::once(message)) {
        let text = entry.text();
        if text.trim().is_empty() {
            continue;
        }
        let speaker = match entry.role {
            ChatRole::User => "User",
            ChatRole::Model => "Assistant",
        };
        prompt.push_str(speaker);
        prompt.push_str(": ");
        prompt.push_str(text.trim());
        prompt.push('\n');
    }
    prompt.push_str("Assistant:");
    prompt
}

//=========================================================================================
// Strategies
//=========================================================================================

/// Continues the stored conversation as a multi-turn session.
pub struct SessionStrategy {
    model: Arc<dyn ChatModelService>,
    history: Arc<Vec<ChatMessage>>,
    message: Arc<ChatMessage>,
}

impl SessionStrategy {
    pub fn new(
        model: Arc<dyn ChatModelService>,
        history: Arc<Vec<ChatMessage>>,
        message: Arc<ChatMessage>,
    ) -> Self {
        Self {
            model,
            history,
            message,
        }
    }
}

#[async_trait]
impl Strategy<String> for SessionStrategy {
    fn name(&self) -> &str {
        "session"
    }

    async fn attempt(&self) -> PortResult<String> {
        let reply = self
            .model
            .continue_conversation(&self.history, &self.message)
            .await?;
        non_empty(reply)
    }
}

/// A stateless completion over the last few turns, flattened into one prompt.
pub struct TranscriptStrategy {
    model: Arc<dyn ChatModelService>,
    history: Arc<Vec<ChatMessage>>,
    message: Arc<ChatMessage>,
    turns: usize,
}

impl TranscriptStrategy {
    pub fn new(
        model: Arc<dyn ChatModelService>,
        history: Arc<Vec<ChatMessage>>,
        message: Arc<ChatMessage>,
        turns: usize,
    ) -> Self {
        Self {
            model,
            history,
            message,
            turns,
        }
    }
}

#[async_trait]
impl Strategy<String> for TranscriptStrategy {
    fn name(&self) -> &str {
        "transcript"
    }

    async fn attempt(&self) -> PortResult<String> {
        let prompt = flatten_transcript(&self.history, &self.message, self.turns);
        let reply = self.model.complete(&prompt).await?;
        non_empty(reply)
    }
}

pub fn apology_strategy() -> FnStrategy<String> {
    FnStrategy::new(APOLOGY_STRATEGY, || async { Ok(APOLOGY.to_string()) }.boxed())
}

//=========================================================================================
// Responder
//=========================================================================================

/// The reply to one chat turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub user_id: String,
    pub response: String,
    pub strategy: String,
    /// Whether the turn was written back to the conversation store.
    pub persisted: bool,
}

/// Answers chat turns and keeps the per-user history up to date.
#[derive(Clone)]
pub struct ChatResponder {
    model: Arc<dyn ChatModelService>,
    store: Arc<dyn ConversationStore>,
    transcript_turns: usize,
    attempt_timeout: Option<Duration>,
}

impl ChatResponder {
    pub fn new(model: Arc<dyn ChatModelService>, store: Arc<dyn ConversationStore>) -> Self {
        Self {
            model,
            store,
            transcript_turns: DEFAULT_TRANSCRIPT_TURNS,
            attempt_timeout: None,
        }
    }

    pub fn with_transcript_turns(mut self, turns: usize) -> Self {
        self.transcript_turns = turns;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn sequencer_for(
        &self,
        history: Arc<Vec<ChatMessage>>,
        message: Arc<ChatMessage>,
    ) -> FallbackSequencer<String> {
        let mut sequencer = FallbackSequencer::new("chat")
            .with_strategy(SessionStrategy::new(
                self.model.clone(),
                history.clone(),
                message.clone(),
            ))
            .with_strategy(TranscriptStrategy::new(
                self.model.clone(),
                history,
                message,
                self.transcript_turns,
            ))
            .with_strategy(apology_strategy());
        if let Some(timeout) = self.attempt_timeout {
            sequencer = sequencer.with_attempt_timeout(timeout);
        }
        sequencer
    }

    /// Answers `message` for `user_id`, minting an id when none is supplied.
    ///
    /// The minted id is returned so the client can keep the session going.
    pub async fn respond(
        &self,
        user_id: Option<String>,
        message: ChatMessage,
        cancel: &CancellationToken,
    ) -> PortResult<ChatReply> {
        if message.text().trim().is_empty() && message.inline_data().next().is_none() {
            return Err(PortError::InvalidArgument(
                "a message or an image is required".to_string(),
            ));
        }

        let user_id = match user_id.map(|id| id.trim().to_string()) {
            Some(id) if !id.is_empty() => id,
            _ => {
                let minted = Uuid::new_v4().to_string();
                info!(user_id = %minted, "No user id supplied; starting an anonymous session.");
                minted
            }
        };

        // If the history cannot be read, answer anyway but do not overwrite it.
        let (mut conversation, writable) = match self.store.load(&user_id).await {
            Ok(Some(conversation)) => (conversation, true),
            Ok(None) => (Conversation::new(&user_id), true),
            Err(e) => {
                warn!(%user_id, error = %e, "Failed to load chat history; continuing without it.");
                (Conversation::new(&user_id), false)
            }
        };

        let history = Arc::new(conversation.messages.clone());
        let turn = Arc::new(message);
        let resolution = self
            .sequencer_for(history, turn.clone())
            .run(cancel)
            .await;

        let (response, strategy) = match resolution {
            Resolution::Resolved {
                value, strategy, ..
            } => (value, strategy),
            Resolution::Exhausted { last_error, .. } => return Err(last_error),
            Resolution::Cancelled { .. } => return Err(PortError::Cancelled),
        };

        let mut persisted = false;
        if writable && strategy != APOLOGY_STRATEGY {
            conversation.messages.push((*turn).clone());
            conversation.messages.push(ChatMessage::model_text(response.clone()));
            conversation.updated_at = Utc::now();
            match self.store.save(&conversation).await {
                Ok(()) => persisted = true,
                Err(e) => warn!(%user_id, error = %e, "Failed to save chat history."),
            }
        }

        Ok(ChatReply {
            user_id,
            response,
            strategy,
            persisted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{InlineData, MessagePart};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A model whose two entry points return scripted results.
    struct ScriptedModel {
        session: PortResult<String>,
        single: PortResult<String>,
        prompts: Mutex<Vec<String>>,
        session_history_lens: Mutex<Vec<usize>>,
    }

    impl ScriptedModel {
        fn new(session: PortResult<String>, single: PortResult<String>) -> Self {
            Self {
                session,
                single,
                prompts: Mutex::new(Vec::new()),
                session_history_lens: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatModelService for ScriptedModel {
        async fn continue_conversation(
            &self,
            history: &[ChatMessage],
            _message: &ChatMessage,
        ) -> PortResult<String> {
            self.session_history_lens.lock().unwrap().push(history.len());
            self.session.clone()
        }

        async fn complete(&self, prompt: &str) -> PortResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.single.clone()
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        conversations: Mutex<HashMap<String, Conversation>>,
        fail_loads: bool,
        fail_saves: bool,
    }

    #[async_trait]
    impl ConversationStore for MemoryStore {
        async fn load(&self, user_id: &str) -> PortResult<Option<Conversation>> {
            if self.fail_loads {
                return Err(PortError::Network("db down".into()));
            }
            Ok(self.conversations.lock().unwrap().get(user_id).cloned())
        }

        async fn save(&self, conversation: &Conversation) -> PortResult<()> {
            if self.fail_saves {
                return Err(PortError::Network("db down".into()));
            }
            self.conversations
                .lock()
                .unwrap()
                .insert(conversation.user_id.clone(), conversation.clone());
            Ok(())
        }
    }

    fn responder(model: ScriptedModel, store: Arc<MemoryStore>) -> (ChatResponder, Arc<ScriptedModel>) {
        let model = Arc::new(model);
        (ChatResponder::new(model.clone(), store), model)
    }

    #[test]
    fn transcript_keeps_the_last_turns_only() {
        let history: Vec<ChatMessage> = (0..5)
            .flat_map(|i| {
                [
                    ChatMessage::user_text(format!("q{i}")),
                    ChatMessage::model_text(format!("a{i}")),
                ]
            })
            .collect();
        let prompt = flatten_transcript(&history, &ChatMessage::user_text("q5"), 2);
        assert_eq!(prompt, "User: q4\nAssistant: a4\nUser: q5\nAssistant:");
    }

    #[test]
    fn transcript_drops_image_only_turns() {
        let image_only = ChatMessage {
            role: ChatRole::User,
            parts: vec![MessagePart::InlineData {
                inline_data: InlineData {
                    mime_type: "image/png".into(),
                    data: "AAAA".into(),
                },
            }],
        };
        let prompt = flatten_transcript(&[image_only], &ChatMessage::user_text("and now?"), 6);
        assert_eq!(prompt, "User: and now?\nAssistant:");
    }

    #[tokio::test]
    async fn session_reply_is_persisted_with_the_turn() {
        let store = Arc::new(MemoryStore::default());
        let (responder, _) = responder(
            ScriptedModel::new(Ok("  Hello there. ".into()), Ok("unused".into())),
            store.clone(),
        );

        let reply = responder
            .respond(
                Some("reader-1".into()),
                ChatMessage::user_text("hi"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(reply.response, "Hello there.");
        assert_eq!(reply.strategy, "session");
        assert!(reply.persisted);
        let stored = store.conversations.lock().unwrap()["reader-1"].clone();
        assert_eq!(
            stored.messages,
            vec![ChatMessage::user_text("hi"), ChatMessage::model_text("Hello there.")]
        );
    }

    #[tokio::test]
    async fn invalid_history_falls_back_to_the_transcript() {
        let store = Arc::new(MemoryStore::default());
        let mut existing = Conversation::new("reader-2");
        existing.messages = vec![
            ChatMessage::user_text("who wrote Dune?"),
            ChatMessage::model_text("Frank Herbert."),
        ];
        store
            .conversations
            .lock()
            .unwrap()
            .insert("reader-2".into(), existing);

        let (responder, model) = responder(
            ScriptedModel::new(
                Err(PortError::InvalidArgument("bad history".into())),
                Ok("Children of Dune came next.".into()),
            ),
            store.clone(),
        );
        let reply = responder
            .respond(
                Some("reader-2".into()),
                ChatMessage::user_text("and the sequel?"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(reply.strategy, "transcript");
        assert_eq!(
            model.prompts.lock().unwrap()[0],
            "User: who wrote Dune?\nAssistant: Frank Herbert.\nUser: and the sequel?\nAssistant:"
        );
        assert_eq!(*model.session_history_lens.lock().unwrap(), vec![2]);
        assert_eq!(store.conversations.lock().unwrap()["reader-2"].messages.len(), 4);
    }

    #[tokio::test]
    async fn apology_is_returned_but_not_persisted() {
        let store = Arc::new(MemoryStore::default());
        let (responder, _) = responder(
            ScriptedModel::new(
                Err(PortError::Network("reset".into())),
                Ok("   ".into()),
            ),
            store.clone(),
        );
        let reply = responder
            .respond(None, ChatMessage::user_text("hello?"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(reply.response, APOLOGY);
        assert_eq!(reply.strategy, APOLOGY_STRATEGY);
        assert!(!reply.persisted);
        assert!(Uuid::parse_str(&reply.user_id).is_ok());
        assert!(store.conversations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unreadable_history_is_not_overwritten() {
        let store = Arc::new(MemoryStore {
            fail_loads: true,
            ..Default::default()
        });
        let (responder, _) = responder(
            ScriptedModel::new(Ok("fine".into()), Ok("unused".into())),
            store.clone(),
        );
        let reply = responder
            .respond(
                Some("reader-3".into()),
                ChatMessage::user_text("hi"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(reply.response, "fine");
        assert!(!reply.persisted);
        assert!(store.conversations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_history_writes_still_answer() {
        let store = Arc::new(MemoryStore {
            fail_saves: true,
            ..Default::default()
        });
        let (responder, _) = responder(
            ScriptedModel::new(Ok("Try Hyperion next.".into()), Ok("unused".into())),
            store.clone(),
        );
        let reply = responder
            .respond(
                Some("reader-5".into()),
                ChatMessage::user_text("what should I read?"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(reply.response, "Try Hyperion next.");
        assert_eq!(reply.strategy, "session");
        assert!(!reply.persisted);
        assert!(store.conversations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_turns_are_rejected() {
        let (responder, model) = responder(
            ScriptedModel::new(Ok("x".into()), Ok("x".into())),
            Arc::new(MemoryStore::default()),
        );
        let error = responder
            .respond(
                Some("reader-4".into()),
                ChatMessage::user_text("   "),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(error.kind(), crate::ports::ErrorKind::InvalidArgument);
        assert!(model.session_history_lens.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_turns_return_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let (responder, _) = responder(
            ScriptedModel::new(Ok("x".into()), Ok("x".into())),
            Arc::new(MemoryStore::default()),
        );
        let error = responder
            .respond(Some("reader-5".into()), ChatMessage::user_text("hi"), &token)
            .await
            .unwrap_err();
        assert_eq!(error, PortError::Cancelled);
    }
}
