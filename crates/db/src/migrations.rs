use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "users",
        "feedback_messages",
        "message_mappings",
        "idx_feedback_messages_user_chat_id",
        "idx_feedback_messages_created_at",
        "idx_message_mappings_chat_id",
        "idx_message_mappings_created_at",
    ];

    #[tokio::test]
    async fn migrations_create_baseline_schema() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("run migrations");

        for object in MANAGED_SCHEMA_OBJECTS {
            let count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE name = ?",
            )
            .bind(object)
            .fetch_one(&pool)
            .await
            .expect("check schema object")
            .get::<i64, _>("count");

            assert_eq!(count, 1, "expected schema object `{object}` to exist");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent_when_rerun() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
