use async_trait::async_trait;
use thiserror::Error;

use postbox_core::domain::mapping::MessageRef;
use postbox_core::domain::user::ChatId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendError {
    #[error("chat {chat_id} unreachable: {message}")]
    Unreachable { chat_id: i64, message: String },
    #[error("message rejected by platform: {message}")]
    Rejected { message: String },
}

/// Opaque outbound send primitive. The concrete transport owns its own
/// timeouts and authentication; this layer only sees success with the
/// delivered message reference, or failure.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send(&self, chat: ChatId, text: &str) -> Result<MessageRef, SendError>;
}

/// Sender that accepts everything and delivers nowhere. Keeps the binary
/// runnable without platform credentials.
#[derive(Default)]
pub struct NoopChatSender;

#[async_trait]
impl ChatSender for NoopChatSender {
    async fn send(&self, chat: ChatId, _text: &str) -> Result<MessageRef, SendError> {
        Ok(MessageRef { chat_id: chat, message_id: postbox_core::domain::mapping::MessageId(0) })
    }
}
