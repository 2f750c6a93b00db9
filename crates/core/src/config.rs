use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub bot: BotConfig,
    pub relay: RelayConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub token: SecretString,
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub max_feedback_length: u32,
    pub cooldown_secs: u64,
    pub notify_mode: NotifyMode,
    pub staff_chat_id: i64,
    pub channel_chat_id: Option<i64>,
    pub moderator_ids: Vec<i64>,
    pub mapping_retention_days: u32,
}

impl RelayConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn mapping_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.mapping_retention_days))
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Where forwarded feedback goes: the primary staff chat, the shared
/// channel, or both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
    Staff,
    Channel,
    Both,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub bot_token: Option<String>,
    pub notify_mode: Option<NotifyMode>,
    pub staff_chat_id: Option<i64>,
    pub channel_chat_id: Option<i64>,
    pub moderator_ids: Option<Vec<i64>>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://postbox.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            bot: BotConfig { token: String::new().into() },
            relay: RelayConfig {
                max_feedback_length: 2000,
                cooldown_secs: 3600,
                notify_mode: NotifyMode::Staff,
                staff_chat_id: 0,
                channel_chat_id: None,
                moderator_ids: Vec::new(),
                mapping_retention_days: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for NotifyMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Self::Staff),
            "channel" => Ok(Self::Channel),
            "both" => Ok(Self::Both),
            other => Err(ConfigError::Validation(format!(
                "unsupported notify mode `{other}` (expected staff|channel|both)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("postbox.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(bot) = patch.bot {
            if let Some(bot_token_value) = bot.token {
                self.bot.token = secret_value(bot_token_value);
            }
        }

        if let Some(relay) = patch.relay {
            if let Some(max_feedback_length) = relay.max_feedback_length {
                self.relay.max_feedback_length = max_feedback_length;
            }
            if let Some(cooldown_secs) = relay.cooldown_secs {
                self.relay.cooldown_secs = cooldown_secs;
            }
            if let Some(notify_mode) = relay.notify_mode {
                self.relay.notify_mode = notify_mode;
            }
            if let Some(staff_chat_id) = relay.staff_chat_id {
                self.relay.staff_chat_id = staff_chat_id;
            }
            if let Some(channel_chat_id) = relay.channel_chat_id {
                self.relay.channel_chat_id = Some(channel_chat_id);
            }
            if let Some(moderator_ids) = relay.moderator_ids {
                self.relay.moderator_ids = moderator_ids;
            }
            if let Some(mapping_retention_days) = relay.mapping_retention_days {
                self.relay.mapping_retention_days = mapping_retention_days;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("POSTBOX_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("POSTBOX_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("POSTBOX_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("POSTBOX_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("POSTBOX_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("POSTBOX_BOT_TOKEN") {
            self.bot.token = secret_value(value);
        }

        if let Some(value) = read_env("POSTBOX_RELAY_MAX_FEEDBACK_LENGTH") {
            self.relay.max_feedback_length =
                parse_u32("POSTBOX_RELAY_MAX_FEEDBACK_LENGTH", &value)?;
        }
        if let Some(value) = read_env("POSTBOX_RELAY_COOLDOWN_SECS") {
            self.relay.cooldown_secs = parse_u64("POSTBOX_RELAY_COOLDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("POSTBOX_RELAY_NOTIFY_MODE") {
            self.relay.notify_mode = value.parse()?;
        }
        if let Some(value) = read_env("POSTBOX_RELAY_STAFF_CHAT_ID") {
            self.relay.staff_chat_id = parse_i64("POSTBOX_RELAY_STAFF_CHAT_ID", &value)?;
        }
        // An empty channel id from the environment means "not configured".
        if let Ok(value) = env::var("POSTBOX_RELAY_CHANNEL_CHAT_ID") {
            self.relay.channel_chat_id = if value.trim().is_empty() {
                None
            } else {
                Some(parse_i64("POSTBOX_RELAY_CHANNEL_CHAT_ID", &value)?)
            };
        }
        if let Some(value) = read_env("POSTBOX_RELAY_MODERATOR_IDS") {
            self.relay.moderator_ids = parse_id_list("POSTBOX_RELAY_MODERATOR_IDS", &value)?;
        }
        if let Some(value) = read_env("POSTBOX_RELAY_MAPPING_RETENTION_DAYS") {
            self.relay.mapping_retention_days =
                parse_u32("POSTBOX_RELAY_MAPPING_RETENTION_DAYS", &value)?;
        }

        if let Some(value) = read_env("POSTBOX_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("POSTBOX_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("POSTBOX_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("POSTBOX_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("POSTBOX_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("POSTBOX_LOGGING_LEVEL").or_else(|| read_env("POSTBOX_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("POSTBOX_LOGGING_FORMAT").or_else(|| read_env("POSTBOX_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(bot_token) = overrides.bot_token {
            self.bot.token = secret_value(bot_token);
        }
        if let Some(notify_mode) = overrides.notify_mode {
            self.relay.notify_mode = notify_mode;
        }
        if let Some(staff_chat_id) = overrides.staff_chat_id {
            self.relay.staff_chat_id = staff_chat_id;
        }
        if let Some(channel_chat_id) = overrides.channel_chat_id {
            self.relay.channel_chat_id = Some(channel_chat_id);
        }
        if let Some(moderator_ids) = overrides.moderator_ids {
            self.relay.moderator_ids = moderator_ids;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_bot(&self.bot)?;
        validate_relay(&self.relay)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("postbox.toml"), PathBuf::from("config/postbox.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    if bot.token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "bot.token is required; obtain one from the platform's bot registration flow"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_relay(relay: &RelayConfig) -> Result<(), ConfigError> {
    if relay.staff_chat_id == 0 {
        return Err(ConfigError::Validation(
            "relay.staff_chat_id is required (the operator's user id)".to_string(),
        ));
    }

    if matches!(relay.notify_mode, NotifyMode::Channel | NotifyMode::Both)
        && relay.channel_chat_id.is_none()
    {
        return Err(ConfigError::Validation(
            "relay.channel_chat_id is required when relay.notify_mode is `channel` or `both`"
                .to_string(),
        ));
    }

    if relay.max_feedback_length == 0 || relay.max_feedback_length > 4096 {
        return Err(ConfigError::Validation(
            "relay.max_feedback_length must be in range 1..=4096 (platform message cap)"
                .to_string(),
        ));
    }

    if relay.cooldown_secs == 0 {
        return Err(ConfigError::Validation(
            "relay.cooldown_secs must be greater than zero".to_string(),
        ));
    }

    if relay.mapping_retention_days == 0 {
        return Err(ConfigError::Validation(
            "relay.mapping_retention_days must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_id_list(key: &str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_i64(key, part))
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    bot: Option<BotPatch>,
    relay: Option<RelayPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RelayPatch {
    max_feedback_length: Option<u32>,
    cooldown_secs: Option<u64>,
    notify_mode: Option<NotifyMode>,
    staff_chat_id: Option<i64>,
    channel_chat_id: Option<i64>,
    moderator_ids: Option<Vec<i64>>,
    mapping_retention_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, NotifyMode};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_POSTBOX_TOKEN", "token-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("postbox.toml");
            fs::write(
                &path,
                r#"
[bot]
token = "${TEST_POSTBOX_TOKEN}"

[relay]
staff_chat_id = 100
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.bot.token.expose_secret() == "token-from-env",
                "bot token should be loaded from environment",
            )?;
            ensure(config.relay.staff_chat_id == 100, "staff chat id should come from the file")?;
            Ok(())
        })();

        clear_vars(&["TEST_POSTBOX_TOKEN"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POSTBOX_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("POSTBOX_BOT_TOKEN", "token-from-env");
        env::set_var("POSTBOX_RELAY_STAFF_CHAT_ID", "555");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("postbox.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[bot]
token = "token-from-file"

[relay]
staff_chat_id = 100

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.bot.token.expose_secret() == "token-from-env",
                "env token should win over file and defaults",
            )?;
            ensure(config.relay.staff_chat_id == 555, "env staff chat id should win over file")?;
            Ok(())
        })();

        clear_vars(&["POSTBOX_DATABASE_URL", "POSTBOX_BOT_TOKEN", "POSTBOX_RELAY_STAFF_CHAT_ID"]);
        result
    }

    #[test]
    fn channel_mode_requires_channel_chat_id() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions {
                overrides: ConfigOverrides {
                    bot_token: Some("token".to_string()),
                    staff_chat_id: Some(100),
                    notify_mode: Some(NotifyMode::Both),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            }) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("relay.channel_chat_id")
            );
            ensure(has_message, "validation failure should mention relay.channel_chat_id")
        })();

        result
    }

    #[test]
    fn empty_channel_chat_id_env_means_not_configured() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POSTBOX_BOT_TOKEN", "token");
        env::set_var("POSTBOX_RELAY_STAFF_CHAT_ID", "100");
        env::set_var("POSTBOX_RELAY_CHANNEL_CHAT_ID", "  ");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.relay.channel_chat_id.is_none(),
                "blank channel chat id should be treated as absent",
            )
        })();

        clear_vars(&[
            "POSTBOX_BOT_TOKEN",
            "POSTBOX_RELAY_STAFF_CHAT_ID",
            "POSTBOX_RELAY_CHANNEL_CHAT_ID",
        ]);
        result
    }

    #[test]
    fn moderator_ids_parse_from_comma_separated_env() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POSTBOX_BOT_TOKEN", "token");
        env::set_var("POSTBOX_RELAY_STAFF_CHAT_ID", "100");
        env::set_var("POSTBOX_RELAY_MODERATOR_IDS", "7, 8 ,9");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            ensure(
                config.relay.moderator_ids == vec![7, 8, 9],
                "moderator ids should parse from a comma separated list",
            )
        })();

        clear_vars(&[
            "POSTBOX_BOT_TOKEN",
            "POSTBOX_RELAY_STAFF_CHAT_ID",
            "POSTBOX_RELAY_MODERATOR_IDS",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_without_bot_token() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POSTBOX_RELAY_STAFF_CHAT_ID", "100");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("bot.token")
            );
            ensure(has_message, "validation failure should mention bot.token")
        })();

        clear_vars(&["POSTBOX_RELAY_STAFF_CHAT_ID"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POSTBOX_BOT_TOKEN", "token");
        env::set_var("POSTBOX_RELAY_STAFF_CHAT_ID", "100");
        env::set_var("POSTBOX_LOG_LEVEL", "warn");
        env::set_var("POSTBOX_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warn log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "POSTBOX_BOT_TOKEN",
            "POSTBOX_RELAY_STAFF_CHAT_ID",
            "POSTBOX_LOG_LEVEL",
            "POSTBOX_LOG_FORMAT",
        ]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("POSTBOX_BOT_TOKEN", "secret-token-value");
        env::set_var("POSTBOX_RELAY_STAFF_CHAT_ID", "100");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("secret-token-value"),
                "debug output should not contain the bot token",
            )?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["POSTBOX_BOT_TOKEN", "POSTBOX_RELAY_STAFF_CHAT_ID"]);
        result
    }
}
