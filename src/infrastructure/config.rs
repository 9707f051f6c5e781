use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::domain::value_objects::{Credentials, ExcludedColumns, LayerRef};

/// Environment variables with this prefix override file values, using `__`
/// between section and key: `LAYERSYNC_PORTAL__PASSWORD`.
pub const ENV_PREFIX: &str = "LAYERSYNC";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub portal: PortalConfig,
    #[serde(default)]
    pub http: HttpConfig,
    pub logs: Option<LogSyncConfig>,
    pub project: Option<ProjectSyncConfig>,
}

#[derive(Deserialize, Clone)]
pub struct PortalConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_referer")]
    pub referer: String,
    pub username: String,
    pub password: String,
}

fn default_token_url() -> String {
    "https://www.arcgis.com/sharing/rest/generateToken".to_string()
}

fn default_referer() -> String {
    "https://www.arcgis.com".to_string()
}

impl PortalConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }
}

impl std::fmt::Debug for PortalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortalConfig")
            .field("token_url", &self.token_url)
            .field("referer", &self.referer)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Hosted log book and the columns its composite `LOG_ID` is built from.
#[derive(Debug, Deserialize, Clone)]
pub struct LogSyncConfig {
    pub layer: LayerRef,
    pub id_field: String,
    pub date_field: String,
    #[serde(default = "default_log_id_field")]
    pub log_id_field: String,
}

pub fn default_log_id_field() -> String {
    "LOG_ID".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectSyncConfig {
    /// Authoritative project table. Required: it has no portal-independent
    /// location.
    pub source: LayerRef,
    /// Feature table brought in line with `source`.
    pub target: LayerRef,
    #[serde(default)]
    pub key: KeyConfig,
    #[serde(default = "default_object_id_field")]
    pub object_id_field: String,
    #[serde(default)]
    pub excluded_columns: ExcludedColumns,
}

fn default_object_id_field() -> String {
    "OBJECTID".to_string()
}

/// Business-key column and the other names the source may use for it.
#[derive(Debug, Deserialize, Clone)]
pub struct KeyConfig {
    #[serde(default = "default_key_column")]
    pub column: String,
    #[serde(default = "default_key_alternates")]
    pub alternates: Vec<String>,
}

fn default_key_column() -> String {
    "UID".to_string()
}

fn default_key_alternates() -> Vec<String> {
    vec!["Project_UID".to_string(), "uid".to_string()]
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            column: default_key_column(),
            alternates: default_key_alternates(),
        }
    }
}

impl AppConfig {
    /// Read `path` (TOML) and apply `LAYERSYNC_*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::new(path, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to read config file: {}", path))?;
        let cfg: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to parse config TOML")?;
        Ok(cfg)
    }
}
