//! Hexagonal ports. Adapter crates implement these; the dispatcher only ever
//! sees the traits, constructed once at startup and passed in.

use async_trait::async_trait;

use crate::domain::{ChatId, ChatRecord, FileRecord, MessageRef, UserId, UserRecord};
use crate::Result;

/// Outbound messaging (Telegram today).
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Send text together with a one-time contact-request keyboard.
    async fn send_contact_prompt(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;
}

/// Language-completion engine (text and vision prompts).
///
/// One attempt per call, no internal retry; every call carries the client's
/// bounded timeout and reports overruns as `ServiceUnavailable`.
#[async_trait]
pub trait CompletionPort: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn describe_image(&self, prompt: &str, image: &[u8], mime: &str) -> Result<String>;
}

/// Web search results: a short summary plus related links, in engine order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    pub summary: String,
    pub links: Vec<String>,
}

#[async_trait]
pub trait SearchPort: Send + Sync {
    /// Empty queries are rejected with `Error::Validation` before any call
    /// goes out.
    async fn search(&self, query: &str) -> Result<SearchResults>;
}

/// User records plus the append-only chat/file logs.
///
/// `upsert_user` must be atomic per key and serialize concurrent writers for
/// the same key; it is the only write path the registration state machine
/// uses. The append operations are insert-only, no update or delete.
#[async_trait]
pub trait StoragePort: Send + Sync {
    async fn upsert_user(&self, record: &UserRecord) -> Result<()>;

    async fn get_user(&self, user_id: UserId) -> Result<Option<UserRecord>>;

    async fn append_chat(&self, record: &ChatRecord) -> Result<()>;

    async fn append_file(&self, record: &FileRecord) -> Result<()>;
}
