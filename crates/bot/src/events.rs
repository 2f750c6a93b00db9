use postbox_core::domain::mapping::MessageRef;
use postbox_core::domain::user::{ChatId, Identity, UserId};

/// One decoded platform update, as handed to the dispatcher by the
/// transport. The webhook/polling plumbing that produces these is outside
/// this crate; everything the routing logic needs is carried here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundEvent {
    pub update_id: i64,
    pub sender: SenderProfile,
    pub chat: ChatContext,
    pub text: String,
    /// Present when the sender replied to an earlier message in the chat.
    pub reply_to: Option<MessageRef>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SenderProfile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SenderProfile {
    pub fn identity(&self) -> Identity {
        Identity::normalized(
            self.user_id,
            self.username.as_deref(),
            self.first_name.as_deref(),
            self.last_name.as_deref(),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatContext {
    pub id: ChatId,
    pub kind: ChatKind,
    pub title: Option<String>,
}
