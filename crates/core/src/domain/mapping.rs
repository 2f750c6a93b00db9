use serde::{Deserialize, Serialize};

use crate::domain::feedback::FeedbackMessageId;
use crate::domain::user::{ChatId, UserId};

/// Platform-assigned id of one message within one chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

/// Reference to a concrete message: the chat it lives in plus the
/// platform message id, which is only unique per chat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Reverse index entry from a delivered copy in a staff chat back to the
/// user who wrote the original feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryMapping {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub user_id: UserId,
    pub feedback_message_id: Option<FeedbackMessageId>,
}

/// Result of resolving a delivered copy: where a staff reply should go.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRoute {
    pub user_id: UserId,
    pub feedback_message_id: Option<FeedbackMessageId>,
}
