pub mod config;
pub mod domain;
pub mod rate_limit;
pub mod state;

pub use domain::feedback::{DeliveryStatus, FeedbackMessageId};
pub use domain::mapping::{DeliveryMapping, MessageId, MessageRef, ReplyRoute};
pub use domain::user::{ChatId, Identity, UserId};
pub use rate_limit::{InMemoryRateLimiter, RateLimitError, RateLimiter};
pub use state::{ConversationState, InMemoryStateStore, StateStore};
