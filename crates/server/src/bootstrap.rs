use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use postbox_bot::delivery::{DeliveryEngine, RecipientSet};
use postbox_bot::dispatch::{RelayDispatcher, RelayPolicy};
use postbox_bot::outbound::NoopChatSender;
use postbox_bot::roles::RoleSet;
use postbox_bot::runner::{NoopTransport, PollRunner, ReconnectPolicy};
use postbox_core::config::{AppConfig, ConfigError, LoadOptions};
use postbox_core::domain::user::{ChatId, UserId};
use postbox_core::rate_limit::InMemoryRateLimiter;
use postbox_core::state::InMemoryStateStore;
use postbox_db::repositories::{
    MappingRepository, SqlFeedbackRepository, SqlMappingRepository, SqlUserRepository,
};
use postbox_db::{connect_with_settings, migrations, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runner: PollRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let mappings = Arc::new(SqlMappingRepository::new(
        db_pool.clone(),
        config.relay.mapping_retention(),
    ));

    // Delivery mappings are volatile routing metadata; losing an expired
    // one only degrades reply routing, so a failed purge is log-only.
    match mappings.purge_expired().await {
        Ok(purged) if purged > 0 => {
            info!(
                event_name = "system.bootstrap.mappings_purged",
                purged, "expired delivery mappings removed"
            );
        }
        Ok(_) => {}
        Err(error) => {
            warn!(
                event_name = "system.bootstrap.mapping_purge_failed",
                error = %error,
                "failed to purge expired delivery mappings"
            );
        }
    }

    // The real platform transport replaces both noops at deployment; the
    // rest of the wiring is identical either way.
    let sender = Arc::new(NoopChatSender);

    let recipients = RecipientSet::from_mode(
        config.relay.notify_mode,
        ChatId(config.relay.staff_chat_id),
        config.relay.channel_chat_id.map(ChatId),
    );
    let delivery = DeliveryEngine::new(sender.clone(), mappings.clone(), recipients);

    let policy = RelayPolicy {
        roles: RoleSet::new(
            UserId(config.relay.staff_chat_id),
            config.relay.moderator_ids.iter().copied().map(UserId),
        ),
        max_feedback_length: config.relay.max_feedback_length,
        channel_chat_id: config.relay.channel_chat_id.map(ChatId),
    };

    let dispatcher = Arc::new(RelayDispatcher::new(
        Arc::new(InMemoryStateStore::default()),
        Arc::new(InMemoryRateLimiter::new(config.relay.cooldown())),
        Arc::new(SqlUserRepository::new(db_pool.clone())),
        Arc::new(SqlFeedbackRepository::new(db_pool.clone())),
        mappings,
        delivery,
        sender,
        policy,
    ));

    let runner = PollRunner::new(Arc::new(NoopTransport), dispatcher, ReconnectPolicy::default());

    Ok(Application { config, db_pool, runner })
}
