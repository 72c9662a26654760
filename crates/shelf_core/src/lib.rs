pub mod chat;
pub mod client_store;
pub mod document;
pub mod domain;
pub mod ports;
pub mod sequencer;

pub use chat::{ChatReply, ChatResponder};
pub use client_store::ClientStore;
pub use document::{DocumentRequest, DocumentResolver, DocumentStrategyKind};
pub use domain::{
    CartItem, ChatMessage, ChatRole, Conversation, DocumentFormat, DocumentHandle, FetchedBody,
    InlineData, MessagePart, ProbeResponse, ViewerKind,
};
pub use ports::{
    BlobStore, ChatModelService, ConversationStore, DocumentFetcher, ErrorKind, PortError,
    PortResult, Strategy,
};
pub use sequencer::{
    FailedAttempt, FallbackSequencer, FnStrategy, Outcome, Report, Resolution, ResolutionSlot,
    SequencerState,
};
