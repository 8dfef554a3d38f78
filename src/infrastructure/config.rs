use crate::application::alerts::{DEFAULT_ALERT_COOLDOWN, DEFAULT_ALERT_THRESHOLD};
use crate::domain::series::DEFAULT_CAPACITY;
use anyhow::ensure;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Upper bound the history backend accepts for `limit`.
pub const MAX_HISTORY_LIMIT: usize = 500;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub broker: BrokerSettings,
    pub history: HistorySettings,
    pub buffer: BufferSettings,
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub alert: AlertSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub tls: bool,
    pub keepalive_secs: u64,
    pub reconnect_interval_ms: u64,
    pub client_id_prefix: String,
    /// Empty means anonymous.
    pub username: String,
    pub password: String,
}

impl BrokerSettings {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySettings {
    pub enabled: bool,
    pub endpoint: String,
    pub limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BufferSettings {
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertSettings {
    pub enabled: bool,
    /// Alerts fire strictly above this humidity (%).
    pub threshold: f64,
    pub cooldown_secs: u64,
    pub telegram_token: String,
    pub telegram_chat_id: String,
    pub telegram_api: String,
}

impl AlertSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Defaults, then `config/dashboard.*` if present, then `DASHBOARD__SECTION__KEY`
/// environment variables.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let builder = with_defaults(config::Config::builder())?
        .add_source(File::with_name("config/dashboard").required(false))
        .add_source(environment());

    finish(builder)
}

fn environment() -> Environment {
    Environment::with_prefix("DASHBOARD")
        .separator("__")
        .try_parsing(true)
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> anyhow::Result<ConfigBuilder<DefaultState>> {
    Ok(builder
        .set_default("broker.host", "broker.hivemq.com")?
        .set_default("broker.port", 8883_i64)?
        .set_default("broker.topic", "sic/dibimbing/FuntasticFour/Reqi/pub/dht")?
        .set_default("broker.tls", true)?
        .set_default("broker.keepalive_secs", 60_i64)?
        .set_default("broker.reconnect_interval_ms", 2000_i64)?
        .set_default("broker.client_id_prefix", "humidity-dashboard")?
        .set_default("broker.username", "")?
        .set_default("broker.password", "")?
        .set_default("history.enabled", true)?
        .set_default("history.endpoint", "http://localhost:8000/api/history")?
        .set_default("history.limit", 30_i64)?
        .set_default("buffer.capacity", DEFAULT_CAPACITY as i64)?
        .set_default("server.bind", "0.0.0.0:8080")?
        .set_default("logging.level", "info")?
        .set_default("alert.enabled", false)?
        .set_default("alert.threshold", DEFAULT_ALERT_THRESHOLD)?
        .set_default("alert.cooldown_secs", DEFAULT_ALERT_COOLDOWN.as_secs() as i64)?
        .set_default("alert.telegram_token", "")?
        .set_default("alert.telegram_chat_id", "")?
        .set_default("alert.telegram_api", "https://api.telegram.org")?)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> anyhow::Result<DashboardConfig> {
    let mut config: DashboardConfig = builder.build()?.try_deserialize()?;

    ensure!(config.buffer.capacity > 0, "buffer.capacity must be positive");
    ensure!(!config.broker.topic.trim().is_empty(), "broker.topic must be set");
    ensure!(config.broker.keepalive_secs > 0, "broker.keepalive_secs must be positive");
    config.history.limit = config.history.limit.clamp(1, MAX_HISTORY_LIMIT);

    if config.alert.enabled {
        ensure!(config.alert.threshold.is_finite(), "alert.threshold must be a number");
        ensure!(!config.alert.telegram_token.is_empty(), "alert.telegram_token must be set");
        ensure!(!config.alert.telegram_chat_id.is_empty(), "alert.telegram_chat_id must be set");
    }

    Ok(config)
}
