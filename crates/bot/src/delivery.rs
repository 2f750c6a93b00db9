use std::sync::Arc;

use tracing::{info, warn};

use postbox_core::config::NotifyMode;
use postbox_core::domain::feedback::FeedbackMessageId;
use postbox_core::domain::mapping::{DeliveryMapping, MessageRef};
use postbox_core::domain::user::{ChatId, Identity};
use postbox_db::repositories::MappingRepository;

use crate::outbound::{ChatSender, SendError};

const FORWARD_HEADER: &str = "\u{1f4e8} New feedback message";

/// Renders a feedback message for staff consumption: a header, the sender's
/// identity fields (id always; username and first name only when present),
/// a blank line, then the user's text byte-for-byte.
pub fn format_feedback(identity: &Identity, text: &str) -> String {
    let mut info = format!("id: {}", identity.user_id.0);
    if let Some(username) = &identity.username {
        info.push_str(&format!("\nusername: {username}"));
    }
    if let Some(first_name) = &identity.first_name {
        info.push_str(&format!("\nfirst name: {first_name}"));
    }

    format!("{FORWARD_HEADER}\n\n{info}\n\n{text}")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Recipient {
    pub chat_id: ChatId,
    pub label: &'static str,
}

/// Concrete recipient chats resolved from the notification mode. At least
/// one configured recipient is a deployment precondition enforced by config
/// validation, not here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientSet {
    targets: Vec<Recipient>,
}

impl RecipientSet {
    pub fn from_mode(mode: NotifyMode, staff_chat: ChatId, channel_chat: Option<ChatId>) -> Self {
        let mut targets = Vec::new();
        if matches!(mode, NotifyMode::Staff | NotifyMode::Both) {
            targets.push(Recipient { chat_id: staff_chat, label: "staff" });
        }
        if matches!(mode, NotifyMode::Channel | NotifyMode::Both) {
            if let Some(chat_id) = channel_chat {
                targets.push(Recipient { chat_id, label: "channel" });
            }
        }
        Self { targets }
    }

    pub fn targets(&self) -> &[Recipient] {
        &self.targets
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub chat_id: ChatId,
    pub label: &'static str,
    pub result: Result<MessageRef, SendError>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub outcomes: Vec<RecipientOutcome>,
}

impl DeliveryReport {
    /// Overall verdict: at least one recipient received a copy.
    pub fn success(&self) -> bool {
        self.outcomes.iter().any(|outcome| outcome.result.is_ok())
    }

    /// Joined failure details for the ledger, empty on full success.
    pub fn error_summary(&self) -> String {
        self.outcomes
            .iter()
            .filter_map(|outcome| {
                outcome
                    .result
                    .as_ref()
                    .err()
                    .map(|error| format!("chat {}: {error}", outcome.chat_id.0))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Fans a formatted feedback message out to the configured recipients and
/// registers every successfully delivered copy as a reply anchor.
pub struct DeliveryEngine {
    sender: Arc<dyn ChatSender>,
    mappings: Arc<dyn MappingRepository>,
    recipients: RecipientSet,
}

impl DeliveryEngine {
    pub fn new(
        sender: Arc<dyn ChatSender>,
        mappings: Arc<dyn MappingRepository>,
        recipients: RecipientSet,
    ) -> Self {
        Self { sender, mappings, recipients }
    }

    pub async fn deliver(
        &self,
        identity: &Identity,
        feedback_message_id: Option<FeedbackMessageId>,
        text: &str,
    ) -> DeliveryReport {
        let formatted = format_feedback(identity, text);
        let mut report = DeliveryReport::default();

        // Each recipient is attempted independently; one failure never
        // short-circuits the rest.
        for recipient in self.recipients.targets() {
            let result = self.sender.send(recipient.chat_id, &formatted).await;

            match &result {
                Ok(delivered) => {
                    info!(
                        event_name = "delivery.copy_sent",
                        user_id = identity.user_id.0,
                        chat_id = recipient.chat_id.0,
                        recipient = recipient.label,
                        message_id = delivered.message_id.0,
                        "feedback copy delivered"
                    );

                    let mapping = DeliveryMapping {
                        chat_id: delivered.chat_id,
                        message_id: delivered.message_id,
                        user_id: identity.user_id,
                        feedback_message_id,
                    };
                    if let Err(error) = self.mappings.remember(mapping).await {
                        // Reply routing degrades for this copy; delivery
                        // itself already happened.
                        warn!(
                            event_name = "delivery.mapping_store_failed",
                            user_id = identity.user_id.0,
                            chat_id = recipient.chat_id.0,
                            error = %error,
                            "failed to store delivery mapping"
                        );
                    }
                }
                Err(error) => {
                    warn!(
                        event_name = "delivery.copy_failed",
                        user_id = identity.user_id.0,
                        chat_id = recipient.chat_id.0,
                        recipient = recipient.label,
                        error = %error,
                        "feedback copy failed"
                    );
                }
            }

            report.outcomes.push(RecipientOutcome {
                chat_id: recipient.chat_id,
                label: recipient.label,
                result,
            });
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use postbox_core::config::NotifyMode;
    use postbox_core::domain::feedback::FeedbackMessageId;
    use postbox_core::domain::mapping::{MessageId, MessageRef};
    use postbox_core::domain::user::{ChatId, Identity, UserId};
    use postbox_db::repositories::{InMemoryMappingRepository, MappingRepository};

    use super::{format_feedback, DeliveryEngine, RecipientSet};
    use crate::outbound::{ChatSender, SendError};

    /// Sender double: scripted failures per chat, sequential message ids.
    struct FakeSender {
        failing_chats: Vec<i64>,
        sent: Mutex<Vec<(i64, String)>>,
        next_message_id: Mutex<HashMap<i64, i64>>,
    }

    impl FakeSender {
        fn new(failing_chats: Vec<i64>) -> Self {
            Self {
                failing_chats,
                sent: Mutex::new(Vec::new()),
                next_message_id: Mutex::new(HashMap::new()),
            }
        }

        async fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatSender for FakeSender {
        async fn send(&self, chat: ChatId, text: &str) -> Result<MessageRef, SendError> {
            if self.failing_chats.contains(&chat.0) {
                return Err(SendError::Unreachable {
                    chat_id: chat.0,
                    message: "scripted failure".to_owned(),
                });
            }

            let mut ids = self.next_message_id.lock().await;
            let id = ids.entry(chat.0).or_insert(0);
            *id += 1;
            self.sent.lock().await.push((chat.0, text.to_owned()));
            Ok(MessageRef { chat_id: chat, message_id: MessageId(*id) })
        }
    }

    fn identity() -> Identity {
        Identity::normalized(UserId(42), Some("@Alice"), Some("Bob"), None)
    }

    fn both_recipients() -> RecipientSet {
        RecipientSet::from_mode(NotifyMode::Both, ChatId(100), Some(ChatId(-200)))
    }

    #[test]
    fn format_orders_id_username_first_name_then_text() {
        let payload = format_feedback(&identity(), "hi");

        let id_pos = payload.find("42").expect("id");
        let username_pos = payload.find("Alice").expect("username");
        let name_pos = payload.find("Bob").expect("first name");
        let text_pos = payload.find("hi").expect("text");
        assert!(id_pos < username_pos && username_pos < name_pos && name_pos < text_pos);
        assert!(!payload.contains("@Alice"));
        assert!(payload.ends_with("\n\nhi"));
    }

    #[test]
    fn format_skips_absent_identity_fields() {
        let bare = Identity::normalized(UserId(7), None, None, None);
        let payload = format_feedback(&bare, "text");

        assert!(payload.contains("id: 7"));
        assert!(!payload.contains("username:"));
        assert!(!payload.contains("first name:"));
    }

    #[test]
    fn format_preserves_text_verbatim() {
        let text = "  multi\nline\n\n  with trailing  ";
        let payload = format_feedback(&identity(), text);
        assert!(payload.ends_with(&format!("\n\n{text}")));
    }

    #[test]
    fn recipient_sets_follow_the_notify_mode() {
        let staff_only = RecipientSet::from_mode(NotifyMode::Staff, ChatId(100), Some(ChatId(-2)));
        assert_eq!(staff_only.targets().len(), 1);
        assert_eq!(staff_only.targets()[0].chat_id, ChatId(100));

        let channel_only =
            RecipientSet::from_mode(NotifyMode::Channel, ChatId(100), Some(ChatId(-2)));
        assert_eq!(channel_only.targets().len(), 1);
        assert_eq!(channel_only.targets()[0].chat_id, ChatId(-2));

        assert_eq!(both_recipients().targets().len(), 2);
    }

    #[tokio::test]
    async fn all_recipients_get_a_copy_and_become_reply_anchors() {
        let sender = Arc::new(FakeSender::new(vec![]));
        let mappings = Arc::new(InMemoryMappingRepository::default());
        let engine = DeliveryEngine::new(sender.clone(), mappings.clone(), both_recipients());

        let report = engine.deliver(&identity(), Some(FeedbackMessageId(9)), "hello").await;

        assert!(report.success());
        assert_eq!(report.error_summary(), "");
        assert_eq!(sender.sent().await.len(), 2);

        for chat in [100, -200] {
            let route = mappings
                .resolve(ChatId(chat), MessageId(1))
                .await
                .expect("resolve")
                .expect("route");
            assert_eq!(route.user_id, UserId(42));
            assert_eq!(route.feedback_message_id, Some(FeedbackMessageId(9)));
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_other_recipient() {
        let sender = Arc::new(FakeSender::new(vec![-200]));
        let mappings = Arc::new(InMemoryMappingRepository::default());
        let engine = DeliveryEngine::new(sender.clone(), mappings.clone(), both_recipients());

        let report = engine.deliver(&identity(), None, "hello").await;

        assert!(report.success());
        assert!(report.error_summary().contains("chat -200"));
        assert_eq!(sender.sent().await.len(), 1);

        // The surviving copy still anchors replies.
        let route = mappings
            .resolve(ChatId(100), MessageId(1))
            .await
            .expect("resolve")
            .expect("route");
        assert_eq!(route.user_id, UserId(42));
    }

    #[tokio::test]
    async fn total_failure_reports_every_recipient() {
        let sender = Arc::new(FakeSender::new(vec![100, -200]));
        let mappings = Arc::new(InMemoryMappingRepository::default());
        let engine = DeliveryEngine::new(sender, mappings, both_recipients());

        let report = engine.deliver(&identity(), None, "hello").await;

        assert!(!report.success());
        let summary = report.error_summary();
        assert!(summary.contains("chat 100"));
        assert!(summary.contains("chat -200"));
    }
}
