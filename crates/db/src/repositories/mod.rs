use async_trait::async_trait;
use thiserror::Error;

use postbox_core::domain::feedback::FeedbackMessageId;
use postbox_core::domain::mapping::{DeliveryMapping, MessageId, ReplyRoute};
use postbox_core::domain::user::{ChatId, Identity, UserId};

pub mod feedback;
pub mod mapping;
pub mod memory;
pub mod user;

pub use feedback::SqlFeedbackRepository;
pub use mapping::SqlMappingRepository;
pub use memory::{InMemoryFeedbackRepository, InMemoryMappingRepository, InMemoryUserRepository};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable user registry. Doubles as the ban registry: the blocked flag is
/// a plain column, and `set_banned` never creates a row as a side effect.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert(&self, identity: &Identity) -> Result<(), RepositoryError>;
    async fn is_banned(&self, user: UserId) -> Result<bool, RepositoryError>;
    /// Returns whether the user existed. Banning an unknown id is reported
    /// as not-found, never auto-created.
    async fn set_banned(&self, user: UserId, banned: bool) -> Result<bool, RepositoryError>;
}

/// Audit ledger for feedback messages: create plus the two one-shot status
/// transitions out of `pending`.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn create(&self, user: UserId, body: &str)
        -> Result<FeedbackMessageId, RepositoryError>;
    async fn mark_delivered(&self, id: FeedbackMessageId) -> Result<(), RepositoryError>;
    async fn mark_failed(
        &self,
        id: FeedbackMessageId,
        error: &str,
    ) -> Result<(), RepositoryError>;
}

/// Reverse index from a delivered copy to the originating user. Entries
/// expire after the retention window; an expired or unknown reference
/// resolves to `Ok(None)`, which callers treat as a normal outcome.
#[async_trait]
pub trait MappingRepository: Send + Sync {
    async fn remember(&self, mapping: DeliveryMapping) -> Result<(), RepositoryError>;
    async fn resolve(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<ReplyRoute>, RepositoryError>;
    async fn purge_expired(&self) -> Result<u64, RepositoryError>;
}
