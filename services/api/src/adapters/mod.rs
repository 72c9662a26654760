pub mod blob_cache;
pub mod chat_llm;
pub mod history_db;
pub mod history_memory;
pub mod http_fetch;

pub use blob_cache::BlobCache;
pub use chat_llm::OpenAiChatAdapter;
pub use history_db::PgConversationStore;
pub use history_memory::InMemoryConversationStore;
pub use http_fetch::ReqwestFetcher;
