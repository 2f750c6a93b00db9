use std::sync::Arc;

use tracing::{error, info, warn};

use postbox_core::domain::mapping::MessageRef;
use postbox_core::domain::user::{ChatId, UserId};
use postbox_core::rate_limit::RateLimiter;
use postbox_core::state::{ConversationState, StateStore};
use postbox_db::repositories::{FeedbackRepository, MappingRepository, UserRepository};

use crate::commands::{self, Command};
use crate::delivery::DeliveryEngine;
use crate::events::{ChatKind, InboundEvent};
use crate::outbound::ChatSender;
use crate::replies;
use crate::roles::{Role, RoleSet};

/// Dispatcher-level policy knobs resolved from configuration at startup.
#[derive(Clone, Debug)]
pub struct RelayPolicy {
    pub roles: RoleSet,
    pub max_feedback_length: u32,
    /// The shared staff channel, when one is configured. Staff replies in
    /// this chat are restricted to the fixed reply-commands.
    pub channel_chat_id: Option<ChatId>,
}

/// What the dispatcher did with one inbound event. Returned for logging
/// and tests; all replies have already been sent when this comes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Greeted,
    ChatInfoSent,
    PromptShown,
    CooldownNotice { remaining_secs: u64 },
    BlockedSender,
    /// A backing store failed mid-check; the event was rejected closed.
    RejectedClosed,
    EmptyFeedback,
    OverLengthFeedback { length: usize },
    CommandInFeedbackSlot,
    FeedbackRelayed { delivered: bool },
    TargetNotFound,
    BanApplied { found: bool },
    BanLifted { found: bool },
    StaffReplyDelivered,
    StaffReplyFailed,
    StaffActionFailed,
    SilentNoOp,
    Unrecognized,
    Ignored,
}

enum ReplyAction {
    Ban,
    Unban,
    Relay { text: String },
}

/// The per-event state machine: interprets each inbound event against
/// conversation state, role, ban status and rate limit, and drives the
/// other components. One instance serves all users concurrently.
pub struct RelayDispatcher {
    state: Arc<dyn StateStore>,
    limiter: Arc<dyn RateLimiter>,
    users: Arc<dyn UserRepository>,
    ledger: Arc<dyn FeedbackRepository>,
    mappings: Arc<dyn MappingRepository>,
    delivery: DeliveryEngine,
    sender: Arc<dyn ChatSender>,
    policy: RelayPolicy,
}

impl RelayDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<dyn StateStore>,
        limiter: Arc<dyn RateLimiter>,
        users: Arc<dyn UserRepository>,
        ledger: Arc<dyn FeedbackRepository>,
        mappings: Arc<dyn MappingRepository>,
        delivery: DeliveryEngine,
        sender: Arc<dyn ChatSender>,
        policy: RelayPolicy,
    ) -> Self {
        Self { state, limiter, users, ledger, mappings, delivery, sender, policy }
    }

    pub async fn handle(&self, event: &InboundEvent) -> Disposition {
        let user = event.sender.user_id;
        let role = self.policy.roles.role_of(user);
        let command = commands::parse_command(&event.text);

        // A staff reply to a delivered copy bypasses the state machine,
        // but only from a context staff may act from.
        if let Some(reply_to) = event.reply_to {
            if role.is_staff() {
                if let Some(action) = self.reply_action(event, command.as_ref()) {
                    return self.handle_staff_reply(event, reply_to, action).await;
                }
            }
        }

        match command {
            Some(Command::Start) => self.handle_start(event).await,
            Some(Command::GetId) => self.handle_get_id(event, role).await,
            Some(Command::Write) => self.handle_initiation(event, user, role).await,
            _ => {
                if self.state.get(user).await == ConversationState::AwaitingFeedback {
                    // Clear the wait before any validation so it can never
                    // get stuck, whatever happens next.
                    self.state.reset(user).await;
                    self.handle_feedback_text(event, user, role).await
                } else {
                    self.handle_fallthrough(event).await
                }
            }
        }
    }

    /// Classifies a staff reply. `None` means the event is not a staff
    /// reply action and falls through to normal handling.
    fn reply_action(&self, event: &InboundEvent, command: Option<&Command>) -> Option<ReplyAction> {
        let in_private = event.chat.kind == ChatKind::Private;
        let in_channel = Some(event.chat.id) == self.policy.channel_chat_id;
        if !in_private && !in_channel {
            return None;
        }

        match command {
            Some(Command::Ban) => Some(ReplyAction::Ban),
            Some(Command::Unban) => Some(ReplyAction::Unban),
            Some(Command::Reply { text }) => Some(ReplyAction::Relay { text: text.clone() }),
            // Other commands keep their usual meaning even as replies.
            Some(_) => None,
            // Bare text acts as a reply only in a private chat; the shared
            // channel takes commands exclusively to avoid accidental leaks.
            None => in_private.then(|| ReplyAction::Relay { text: event.text.clone() }),
        }
    }

    async fn handle_start(&self, event: &InboundEvent) -> Disposition {
        let identity = event.sender.identity();
        if let Err(err) = self.users.upsert(&identity).await {
            warn!(
                event_name = "relay.user_upsert_failed",
                user_id = identity.user_id.0,
                error = %err,
                "failed to store user on greeting"
            );
        }

        self.state.reset(event.sender.user_id).await;
        self.send_reply(event, replies::GREETING).await;

        info!(
            event_name = "relay.greeted",
            user_id = event.sender.user_id.0,
            chat_id = event.chat.id.0,
            "greeted user"
        );
        Disposition::Greeted
    }

    async fn handle_get_id(&self, event: &InboundEvent, role: Role) -> Disposition {
        // Unauthorized access to staff surfaces gets silence, not errors.
        if role != Role::Admin {
            return Disposition::Ignored;
        }

        let title = event.chat.title.as_deref().unwrap_or("-");
        let text = replies::chat_info(event.chat.id.0, event.chat.kind.as_str(), title);
        self.send_reply(event, &text).await;
        Disposition::ChatInfoSent
    }

    async fn handle_initiation(
        &self,
        event: &InboundEvent,
        user: UserId,
        role: Role,
    ) -> Disposition {
        if !role.is_staff() {
            match self.users.is_banned(user).await {
                Ok(false) => {}
                Ok(true) => {
                    self.send_reply(event, replies::BLOCKED).await;
                    return Disposition::BlockedSender;
                }
                Err(err) => {
                    error!(
                        event_name = "relay.ban_check_failed",
                        user_id = user.0,
                        error = %err,
                        "ban check failed; rejecting closed"
                    );
                    self.send_reply(event, replies::TRY_LATER).await;
                    return Disposition::RejectedClosed;
                }
            }

            match self.limiter.try_admit(user).await {
                Ok(true) => {}
                Ok(false) => {
                    let remaining = self
                        .limiter
                        .remaining_cooldown(user)
                        .await
                        .unwrap_or(std::time::Duration::ZERO);
                    let minutes = remaining.as_secs().div_ceil(60).max(1);
                    self.send_reply(event, &replies::rate_limited(minutes)).await;

                    info!(
                        event_name = "relay.rate_limited",
                        user_id = user.0,
                        remaining_secs = remaining.as_secs(),
                        "initiation denied by cooldown"
                    );
                    return Disposition::CooldownNotice { remaining_secs: remaining.as_secs() };
                }
                Err(err) => {
                    // Silent admission would nullify the control; reject
                    // closed and tell the user to retry.
                    error!(
                        event_name = "relay.rate_limit_store_failed",
                        user_id = user.0,
                        error = %err,
                        "rate limit store failed; rejecting closed"
                    );
                    self.send_reply(event, replies::TRY_LATER).await;
                    return Disposition::RejectedClosed;
                }
            }
        }

        self.state.set(user, ConversationState::AwaitingFeedback).await;
        self.send_reply(event, &replies::ask_feedback(self.policy.max_feedback_length)).await;
        Disposition::PromptShown
    }

    async fn handle_feedback_text(
        &self,
        event: &InboundEvent,
        user: UserId,
        role: Role,
    ) -> Disposition {
        if !role.is_staff() {
            match self.users.is_banned(user).await {
                Ok(false) => {}
                Ok(true) => {
                    self.send_reply(event, replies::BLOCKED).await;
                    return Disposition::BlockedSender;
                }
                Err(err) => {
                    error!(
                        event_name = "relay.ban_check_failed",
                        user_id = user.0,
                        error = %err,
                        "ban check failed; rejecting closed"
                    );
                    self.send_reply(event, replies::TRY_LATER).await;
                    return Disposition::RejectedClosed;
                }
            }

            // The feedback slot must not become a command injection vector.
            if commands::looks_like_command(&event.text) {
                self.send_reply(event, replies::UNRECOGNIZED).await;
                return Disposition::CommandInFeedbackSlot;
            }
        }

        let text = event.text.trim();
        if text.is_empty() {
            self.send_reply(event, replies::EMPTY_FEEDBACK).await;
            return Disposition::EmptyFeedback;
        }

        let length = text.chars().count();
        let limit = self.policy.max_feedback_length;
        if length > limit as usize {
            self.send_reply(event, &replies::too_long(length, limit)).await;
            return Disposition::OverLengthFeedback { length };
        }

        let identity = event.sender.identity();
        if let Err(err) = self.users.upsert(&identity).await {
            warn!(
                event_name = "relay.user_upsert_failed",
                user_id = user.0,
                error = %err,
                "failed to refresh user before delivery"
            );
        }

        // Audit writes are log-only; the user-visible verdict comes from
        // the delivery engine alone.
        let feedback_id = match self.ledger.create(user, text).await {
            Ok(id) => Some(id),
            Err(err) => {
                error!(
                    event_name = "relay.ledger_create_failed",
                    user_id = user.0,
                    error = %err,
                    "failed to record feedback message"
                );
                None
            }
        };

        let report = self.delivery.deliver(&identity, feedback_id, text).await;
        let delivered = report.success();

        if let Some(id) = feedback_id {
            let update = if delivered {
                self.ledger.mark_delivered(id).await
            } else {
                let summary = report.error_summary();
                let summary =
                    if summary.is_empty() { "platform send error".to_owned() } else { summary };
                self.ledger.mark_failed(id, &summary).await
            };
            if let Err(err) = update {
                error!(
                    event_name = "relay.ledger_update_failed",
                    user_id = user.0,
                    feedback_message_id = id.0,
                    error = %err,
                    "failed to update delivery status"
                );
            }
        }

        info!(
            event_name = "relay.feedback_relayed",
            user_id = user.0,
            delivered,
            length,
            "feedback processed"
        );
        self.send_reply(event, if delivered { replies::SENT_OK } else { replies::SENT_FAIL })
            .await;
        Disposition::FeedbackRelayed { delivered }
    }

    async fn handle_staff_reply(
        &self,
        event: &InboundEvent,
        reply_to: MessageRef,
        action: ReplyAction,
    ) -> Disposition {
        let route = match self.mappings.resolve(reply_to.chat_id, reply_to.message_id).await {
            Ok(Some(route)) => route,
            Ok(None) => {
                // Expired or unknown anchor: a normal, reportable outcome.
                self.send_reply(event, replies::TARGET_NOT_FOUND).await;
                return Disposition::TargetNotFound;
            }
            Err(err) => {
                error!(
                    event_name = "relay.mapping_resolve_failed",
                    chat_id = reply_to.chat_id.0,
                    message_id = reply_to.message_id.0,
                    error = %err,
                    "failed to resolve delivered copy"
                );
                self.send_reply(event, replies::ACTION_FAILED).await;
                return Disposition::RejectedClosed;
            }
        };

        match action {
            ReplyAction::Ban => match self.users.set_banned(route.user_id, true).await {
                Ok(true) => {
                    info!(
                        event_name = "relay.user_banned",
                        user_id = route.user_id.0,
                        actor_id = event.sender.user_id.0,
                        "user banned by staff"
                    );
                    self.send_reply(event, replies::BAN_DONE).await;
                    Disposition::BanApplied { found: true }
                }
                Ok(false) => {
                    self.send_reply(event, replies::BAN_NOT_FOUND).await;
                    Disposition::BanApplied { found: false }
                }
                Err(err) => {
                    error!(
                        event_name = "relay.ban_write_failed",
                        user_id = route.user_id.0,
                        error = %err,
                        "failed to persist ban"
                    );
                    self.send_reply(event, replies::ACTION_FAILED).await;
                    Disposition::StaffActionFailed
                }
            },
            ReplyAction::Unban => match self.users.set_banned(route.user_id, false).await {
                Ok(true) => {
                    info!(
                        event_name = "relay.user_unbanned",
                        user_id = route.user_id.0,
                        actor_id = event.sender.user_id.0,
                        "user unbanned by staff"
                    );
                    self.send_reply(event, replies::UNBAN_DONE).await;
                    Disposition::BanLifted { found: true }
                }
                Ok(false) => {
                    self.send_reply(event, replies::UNBAN_NOT_FOUND).await;
                    Disposition::BanLifted { found: false }
                }
                Err(err) => {
                    error!(
                        event_name = "relay.ban_write_failed",
                        user_id = route.user_id.0,
                        error = %err,
                        "failed to persist unban"
                    );
                    self.send_reply(event, replies::ACTION_FAILED).await;
                    Disposition::StaffActionFailed
                }
            },
            ReplyAction::Relay { text } => {
                let text = text.trim();
                if text.is_empty() {
                    return Disposition::SilentNoOp;
                }

                // A user's private chat id equals the user id on this
                // platform, so the route is directly addressable.
                let user_chat = ChatId(route.user_id.0);
                match self.sender.send(user_chat, &replies::staff_reply(text)).await {
                    Ok(_) => {
                        info!(
                            event_name = "relay.staff_reply_delivered",
                            user_id = route.user_id.0,
                            actor_id = event.sender.user_id.0,
                            "staff reply routed to user"
                        );
                        self.send_reply(event, replies::REPLY_DELIVERED).await;
                        Disposition::StaffReplyDelivered
                    }
                    Err(err) => {
                        warn!(
                            event_name = "relay.staff_reply_failed",
                            user_id = route.user_id.0,
                            error = %err,
                            "staff reply could not be delivered"
                        );
                        self.send_reply(event, replies::REPLY_FAILED).await;
                        Disposition::StaffReplyFailed
                    }
                }
            }
        }
    }

    async fn handle_fallthrough(&self, event: &InboundEvent) -> Disposition {
        match event.chat.kind {
            ChatKind::Private => {
                self.send_reply(event, replies::UNRECOGNIZED).await;
                Disposition::Unrecognized
            }
            // Unmatched chatter in shared contexts is left unanswered.
            ChatKind::Group => Disposition::Ignored,
        }
    }

    async fn send_reply(&self, event: &InboundEvent, text: &str) {
        if let Err(err) = self.sender.send(event.chat.id, text).await {
            warn!(
                event_name = "relay.reply_send_failed",
                chat_id = event.chat.id.0,
                error = %err,
                "failed to send reply to originating chat"
            );
        }
    }
}
