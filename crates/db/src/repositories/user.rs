use async_trait::async_trait;
use chrono::Utc;

use postbox_core::domain::user::{Identity, UserId};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn upsert(&self, identity: &Identity) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO users
                (chat_user_id, username, first_name, last_name, is_blocked, created_at, last_seen_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)
             ON CONFLICT(chat_user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                last_seen_at = excluded.last_seen_at",
        )
        .bind(identity.user_id.0)
        .bind(&identity.username)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_banned(&self, user: UserId) -> Result<bool, RepositoryError> {
        let blocked: Option<bool> =
            sqlx::query_scalar("SELECT is_blocked FROM users WHERE chat_user_id = ?")
                .bind(user.0)
                .fetch_optional(&self.pool)
                .await?;

        Ok(blocked.unwrap_or(false))
    }

    async fn set_banned(&self, user: UserId, banned: bool) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE users SET is_blocked = ? WHERE chat_user_id = ?")
            .bind(banned)
            .bind(user.0)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use postbox_core::domain::user::{Identity, UserId};

    use super::SqlUserRepository;
    use crate::connect_with_settings;
    use crate::migrations::run_pending;
    use crate::repositories::UserRepository;

    async fn repo() -> SqlUserRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        SqlUserRepository::new(pool)
    }

    fn identity(id: i64, username: Option<&str>) -> Identity {
        Identity::normalized(UserId(id), username, Some("First"), None)
    }

    #[tokio::test]
    async fn upsert_creates_then_refreshes_display_fields() {
        let repo = repo().await;

        repo.upsert(&identity(42, Some("old_name"))).await.expect("first upsert");
        repo.upsert(&identity(42, Some("new_name"))).await.expect("second upsert");

        let row = sqlx::query("SELECT username, is_blocked FROM users WHERE chat_user_id = 42")
            .fetch_one(&repo.pool)
            .await
            .expect("fetch user");
        assert_eq!(row.get::<String, _>("username"), "new_name");
        assert!(!row.get::<bool, _>("is_blocked"));
    }

    #[tokio::test]
    async fn upsert_preserves_the_blocked_flag() {
        let repo = repo().await;

        repo.upsert(&identity(42, Some("name"))).await.expect("upsert");
        assert!(repo.set_banned(UserId(42), true).await.expect("ban"));

        repo.upsert(&identity(42, Some("renamed"))).await.expect("re-upsert");
        assert!(repo.is_banned(UserId(42)).await.expect("is_banned"));
    }

    #[tokio::test]
    async fn unknown_user_is_not_banned() {
        let repo = repo().await;
        assert!(!repo.is_banned(UserId(999)).await.expect("is_banned"));
    }

    #[tokio::test]
    async fn banning_an_unknown_user_reports_not_found_and_creates_nothing() {
        let repo = repo().await;

        assert!(!repo.set_banned(UserId(999), true).await.expect("set_banned"));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&repo.pool)
            .await
            .expect("count users");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn banning_twice_is_idempotent_and_both_report_found() {
        let repo = repo().await;
        repo.upsert(&identity(42, None)).await.expect("upsert");

        assert!(repo.set_banned(UserId(42), true).await.expect("first ban"));
        assert!(repo.set_banned(UserId(42), true).await.expect("second ban"));
        assert!(repo.is_banned(UserId(42)).await.expect("is_banned"));
    }

    #[tokio::test]
    async fn unban_clears_the_flag() {
        let repo = repo().await;
        repo.upsert(&identity(42, None)).await.expect("upsert");

        repo.set_banned(UserId(42), true).await.expect("ban");
        assert!(repo.set_banned(UserId(42), false).await.expect("unban"));
        assert!(!repo.is_banned(UserId(42)).await.expect("is_banned"));
    }
}
