use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use postbox_core::domain::feedback::{DeliveryStatus, FeedbackMessageId};
use postbox_core::domain::mapping::{DeliveryMapping, MessageId, ReplyRoute};
use postbox_core::domain::user::{ChatId, Identity, UserId};

use super::{FeedbackRepository, MappingRepository, RepositoryError, UserRepository};

#[derive(Clone, Debug)]
struct StoredUser {
    identity: Identity,
    blocked: bool,
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, StoredUser>>,
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn upsert(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        let blocked = users.get(&identity.user_id).map(|user| user.blocked).unwrap_or(false);
        users.insert(identity.user_id, StoredUser { identity: identity.clone(), blocked });
        Ok(())
    }

    async fn is_banned(&self, user: UserId) -> Result<bool, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&user).map(|user| user.blocked).unwrap_or(false))
    }

    async fn set_banned(&self, user: UserId, banned: bool) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        match users.get_mut(&user) {
            Some(stored) => {
                stored.blocked = banned;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl InMemoryUserRepository {
    pub async fn stored_identity(&self, user: UserId) -> Option<Identity> {
        let users = self.users.read().await;
        users.get(&user).map(|stored| stored.identity.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedbackRecord {
    pub id: FeedbackMessageId,
    pub user_id: UserId,
    pub body: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct InMemoryFeedbackRepository {
    records: RwLock<Vec<FeedbackRecord>>,
}

impl InMemoryFeedbackRepository {
    pub async fn records(&self) -> Vec<FeedbackRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl FeedbackRepository for InMemoryFeedbackRepository {
    async fn create(
        &self,
        user: UserId,
        body: &str,
    ) -> Result<FeedbackMessageId, RepositoryError> {
        let mut records = self.records.write().await;
        let id = FeedbackMessageId(records.len() as i64 + 1);
        records.push(FeedbackRecord {
            id,
            user_id: user,
            body: body.to_owned(),
            status: DeliveryStatus::Pending,
            error: None,
        });
        Ok(id)
    }

    async fn mark_delivered(&self, id: FeedbackMessageId) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if let Some(record) = records
            .iter_mut()
            .find(|record| record.id == id && record.status == DeliveryStatus::Pending)
        {
            record.status = DeliveryStatus::Delivered;
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: FeedbackMessageId,
        error: &str,
    ) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        if let Some(record) = records
            .iter_mut()
            .find(|record| record.id == id && record.status == DeliveryStatus::Pending)
        {
            record.status = DeliveryStatus::Failed;
            record.error = Some(error.to_owned());
        }
        Ok(())
    }
}

struct StoredMapping {
    route: ReplyRoute,
    created_at: DateTime<Utc>,
}

pub struct InMemoryMappingRepository {
    retention: Duration,
    mappings: RwLock<HashMap<(ChatId, MessageId), StoredMapping>>,
}

impl InMemoryMappingRepository {
    pub fn new(retention: Duration) -> Self {
        Self { retention, mappings: RwLock::new(HashMap::new()) }
    }
}

impl Default for InMemoryMappingRepository {
    fn default() -> Self {
        Self::new(Duration::days(30))
    }
}

#[async_trait]
impl MappingRepository for InMemoryMappingRepository {
    async fn remember(&self, mapping: DeliveryMapping) -> Result<(), RepositoryError> {
        let mut mappings = self.mappings.write().await;
        mappings.insert(
            (mapping.chat_id, mapping.message_id),
            StoredMapping {
                route: ReplyRoute {
                    user_id: mapping.user_id,
                    feedback_message_id: mapping.feedback_message_id,
                },
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn resolve(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<ReplyRoute>, RepositoryError> {
        let cutoff = Utc::now() - self.retention;
        let mappings = self.mappings.read().await;
        Ok(mappings
            .get(&(chat_id, message_id))
            .filter(|stored| stored.created_at >= cutoff)
            .map(|stored| stored.route))
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let cutoff = Utc::now() - self.retention;
        let mut mappings = self.mappings.write().await;
        let before = mappings.len();
        mappings.retain(|_, stored| stored.created_at >= cutoff);
        Ok((before - mappings.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use postbox_core::domain::feedback::DeliveryStatus;
    use postbox_core::domain::mapping::{DeliveryMapping, MessageId};
    use postbox_core::domain::user::{ChatId, Identity, UserId};

    use super::{InMemoryFeedbackRepository, InMemoryMappingRepository, InMemoryUserRepository};
    use crate::repositories::{FeedbackRepository, MappingRepository, UserRepository};

    #[tokio::test]
    async fn in_memory_users_preserve_blocked_flag_across_upserts() {
        let repo = InMemoryUserRepository::default();
        let identity = Identity::normalized(UserId(1), Some("alice"), None, None);

        repo.upsert(&identity).await.expect("upsert");
        assert!(repo.set_banned(UserId(1), true).await.expect("ban"));
        repo.upsert(&identity).await.expect("re-upsert");

        assert!(repo.is_banned(UserId(1)).await.expect("is_banned"));
    }

    #[tokio::test]
    async fn in_memory_ban_of_unknown_user_is_not_found() {
        let repo = InMemoryUserRepository::default();
        assert!(!repo.set_banned(UserId(9), true).await.expect("set_banned"));
    }

    #[tokio::test]
    async fn in_memory_ledger_transitions_are_one_shot() {
        let repo = InMemoryFeedbackRepository::default();
        let id = repo.create(UserId(1), "hello").await.expect("create");

        repo.mark_delivered(id).await.expect("deliver");
        repo.mark_failed(id, "late").await.expect("late no-op");

        let records = repo.records().await;
        assert_eq!(records[0].status, DeliveryStatus::Delivered);
        assert_eq!(records[0].error, None);
    }

    #[tokio::test]
    async fn in_memory_mappings_expire_with_zero_retention() {
        let repo = InMemoryMappingRepository::new(Duration::zero());
        repo.remember(DeliveryMapping {
            chat_id: ChatId(-100),
            message_id: MessageId(5),
            user_id: UserId(1),
            feedback_message_id: None,
        })
        .await
        .expect("remember");

        let route = repo.resolve(ChatId(-100), MessageId(5)).await.expect("resolve");
        assert_eq!(route, None);
    }
}
