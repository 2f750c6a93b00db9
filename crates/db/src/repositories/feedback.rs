use async_trait::async_trait;
use chrono::Utc;

use postbox_core::domain::feedback::FeedbackMessageId;
use postbox_core::domain::user::UserId;

use super::{FeedbackRepository, RepositoryError};
use crate::DbPool;

pub struct SqlFeedbackRepository {
    pool: DbPool,
}

impl SqlFeedbackRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedbackRepository for SqlFeedbackRepository {
    async fn create(
        &self,
        user: UserId,
        body: &str,
    ) -> Result<FeedbackMessageId, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO feedback_messages (user_chat_id, body, created_at, delivery_status)
             VALUES (?, ?, ?, 'pending')",
        )
        .bind(user.0)
        .bind(body)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(FeedbackMessageId(result.last_insert_rowid()))
    }

    async fn mark_delivered(&self, id: FeedbackMessageId) -> Result<(), RepositoryError> {
        // The `pending` guard makes the transition one-shot.
        sqlx::query(
            "UPDATE feedback_messages
             SET delivery_status = 'delivered', delivered_at = ?
             WHERE id = ? AND delivery_status = 'pending'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        id: FeedbackMessageId,
        error: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE feedback_messages
             SET delivery_status = 'failed', error = ?
             WHERE id = ? AND delivery_status = 'pending'",
        )
        .bind(error)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
