use crate::application::connection_manager::ConnectionSettings;
use crate::application::history_cache::CacheSettings;
use crate::domain::telemetry::ChartKind;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConnectionConfig {
    #[serde(default = "default_live_url")]
    pub url: String,
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    #[serde(default = "default_liveness_timeout_secs")]
    pub liveness_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_url")]
    pub base_url: String,
    #[serde(default = "default_freshness_secs")]
    pub freshness_secs: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChartConfig {
    pub id: String,
    pub kind: ChartKind,
    /// Relative to `history.base_url`, e.g. `switches/pump`.
    pub path: String,
}

fn default_live_url() -> String {
    "ws://127.0.0.1:8090/live".to_string()
}

fn default_history_url() -> String {
    "http://127.0.0.1:8090/api/history".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    10
}

fn default_liveness_timeout_secs() -> u64 {
    120
}

fn default_freshness_secs() -> u64 {
    300
}

fn default_refresh_interval_secs() -> u64 {
    60
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_live_url(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            liveness_timeout_secs: default_liveness_timeout_secs(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_history_url(),
            freshness_secs: default_freshness_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            charts: Vec::new(),
        }
    }
}

impl From<&ConnectionConfig> for ConnectionSettings {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            liveness_timeout: Duration::from_secs(config.liveness_timeout_secs),
        }
    }
}

impl HistoryConfig {
    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            freshness: Duration::from_secs(self.freshness_secs),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
        }
    }
}

impl ChartConfig {
    pub fn source_url(&self, base_url: &str) -> String {
        source_url(base_url, &self.path)
    }
}

/// Join `path` onto `base_url`, percent-encoding each segment
pub fn source_url(base_url: &str, path: &str) -> String {
    let segments: Vec<String> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), segments.join("/"))
}

/// `config/dashboard.*` when present, overridden by `DASHBOARD__*` variables
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard").required(false))
        .add_source(
            config::Environment::with_prefix("DASHBOARD")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}
