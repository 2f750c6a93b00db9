use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::Row;

use postbox_core::domain::feedback::FeedbackMessageId;
use postbox_core::domain::mapping::{DeliveryMapping, MessageId, ReplyRoute};
use postbox_core::domain::user::{ChatId, UserId};

use super::{MappingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMappingRepository {
    pool: DbPool,
    retention: Duration,
}

impl SqlMappingRepository {
    pub fn new(pool: DbPool, retention: Duration) -> Self {
        Self { pool, retention }
    }

    fn cutoff(&self) -> String {
        (Utc::now() - self.retention).to_rfc3339()
    }
}

#[async_trait]
impl MappingRepository for SqlMappingRepository {
    async fn remember(&self, mapping: DeliveryMapping) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO message_mappings
                (chat_id, message_id, user_chat_id, feedback_message_id, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(chat_id, message_id) DO UPDATE SET
                user_chat_id = excluded.user_chat_id,
                feedback_message_id = excluded.feedback_message_id",
        )
        .bind(mapping.chat_id.0)
        .bind(mapping.message_id.0)
        .bind(mapping.user_id.0)
        .bind(mapping.feedback_message_id.map(|id| id.0))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn resolve(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<Option<ReplyRoute>, RepositoryError> {
        let row = sqlx::query(
            "SELECT user_chat_id, feedback_message_id
             FROM message_mappings
             WHERE chat_id = ? AND message_id = ? AND created_at >= ?",
        )
        .bind(chat_id.0)
        .bind(message_id.0)
        .bind(self.cutoff())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ReplyRoute {
            user_id: UserId(row.get::<i64, _>("user_chat_id")),
            feedback_message_id: row
                .get::<Option<i64>, _>("feedback_message_id")
                .map(FeedbackMessageId),
        }))
    }

    async fn purge_expired(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM message_mappings WHERE created_at < ?")
            .bind(self.cutoff())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
