//! services/api/src/adapters/history_db.rs
//!
//! This module contains the chat-history database adapter, the concrete
//! implementation of the `ConversationStore` port from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelf_core::domain::{ChatMessage, Conversation};
use shelf_core::ports::{ConversationStore, PortError, PortResult};
use sqlx::{types::Json, FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `ConversationStore` port.
#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    /// Creates a new `PgConversationStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ChatHistoryRecord {
    user_id: String,
    messages: Json<Vec<ChatMessage>>,
    updated_at: DateTime<Utc>,
}
impl ChatHistoryRecord {
    fn to_domain(self) -> Conversation {
        Conversation {
            user_id: self.user_id,
            messages: self.messages.0,
            updated_at: self.updated_at,
        }
    }
}

fn map_db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            PortError::Network(e.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => PortError::Parse(e.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `ConversationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn load(&self, user_id: &str) -> PortResult<Option<Conversation>> {
        let record = sqlx::query_as::<_, ChatHistoryRecord>(
            "SELECT user_id, messages, updated_at FROM chat_histories WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(record.map(ChatHistoryRecord::to_domain))
    }

    async fn save(&self, conversation: &Conversation) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO chat_histories (user_id, messages, updated_at) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET messages = EXCLUDED.messages, updated_at = EXCLUDED.updated_at",
        )
        .bind(&conversation.user_id)
        .bind(Json(conversation.messages.clone()))
        .bind(conversation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }
}
