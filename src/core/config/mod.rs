//! Layered service configuration
//!
//! Precedence, lowest first: built-in defaults, `chamados.toml` (or the file named by
//! `CHAMADOS_CONFIG`), then `CHAMADOS_*` environment variables with `__` separating
//! sections (`CHAMADOS_SERVER__PORT=9090`). `DATABASE_URL` is honoured when the database
//! section leaves the url empty.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "chamados.toml";
const INSECURE_JWT_SECRET: &str = "change-me";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub webhook: WebhookConfig,
    pub realtime: RealtimeConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    /// Admin account created with the default password when no technician exists yet.
    pub bootstrap_admin_email: Option<String>,
    pub bootstrap_admin_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: INSECURE_JWT_SECRET.to_string(),
            token_ttl_minutes: 8 * 60,
            bootstrap_admin_email: None,
            bootstrap_admin_name: "Administrador".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == INSECURE_JWT_SECRET
    }
}

/// Where attachment paths resolve to public URLs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:9000/storage/v1/object/public".to_string(),
        }
    }
}

/// Chat automation endpoint. Without a url, messages are written straight to the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: 15,
        }
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Fallback refresh tick sent to subscribers that may have missed a push.
    pub poll_interval_secs: u64,
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            channel_capacity: 256,
        }
    }
}

impl RealtimeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

impl AppConfig {
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CHAMADOS_").split("__"))
    }

    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let mut config: AppConfig = Self::figment(path).extract()?;
        if config.database.url.is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load() -> Result<Self, anyhow::Error> {
        let path = std::env::var("CHAMADOS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::from_file(&path)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.database.url.is_empty() {
            anyhow::bail!("database.url is not set (CHAMADOS_DATABASE__URL or DATABASE_URL)");
        }
        if self.auth.jwt_secret.is_empty() {
            anyhow::bail!("auth.jwt_secret must not be empty");
        }
        if self.auth.token_ttl_minutes <= 0 {
            anyhow::bail!("auth.token_ttl_minutes must be positive");
        }
        if self.realtime.channel_capacity == 0 {
            anyhow::bail!("realtime.channel_capacity must be positive");
        }
        if let Some(url) = &self.webhook.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("webhook.url must be an http(s) url, got {url}");
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
