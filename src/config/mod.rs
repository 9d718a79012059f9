use anyhow::{bail, Context, Result};
use axum_extra::extract::cookie::SameSite;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::auth::TokenConfig;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cookie: CookieConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Origins allowed to call the API with credentials (the refresh cookie)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/tokengate.db")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for access tokens. Must be non-empty at startup.
    #[serde(default)]
    pub signing_key: String,
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl_secs: i64,
    /// Key mixed into every password digest
    #[serde(default)]
    pub password_salt: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key: String::new(),
            access_token_ttl_secs: default_access_token_ttl(),
            refresh_token_ttl_secs: default_refresh_token_ttl(),
            password_salt: String::new(),
        }
    }
}

fn default_access_token_ttl() -> i64 {
    15 * 60
}

fn default_refresh_token_ttl() -> i64 {
    30 * 24 * 60 * 60
}

impl AuthConfig {
    /// Codec settings, with both TTLs checked to be positive and representable.
    pub fn token_config(&self) -> Result<TokenConfig> {
        Ok(TokenConfig {
            signing_key: self.signing_key.clone(),
            access_ttl: ttl("auth.access_token_ttl_secs", self.access_token_ttl_secs)?,
            refresh_ttl: ttl("auth.refresh_token_ttl_secs", self.refresh_token_ttl_secs)?,
        })
    }
}

fn ttl(field: &str, secs: i64) -> Result<Duration> {
    if secs <= 0 {
        bail!("{} must be positive, got {}", field, secs);
    }
    let ttl = Duration::try_seconds(secs)
        .with_context(|| format!("{} is out of range: {}", field, secs))?;
    // Expiry timestamps are computed as now + ttl
    Utc::now()
        .checked_add_signed(ttl)
        .with_context(|| format!("{} is out of range: {}", field, secs))?;
    Ok(ttl)
}

#[derive(Debug, Clone, Deserialize)]
pub struct CookieConfig {
    /// Domain attribute of the refresh cookie; host-only when unset
    pub domain: Option<String>,
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSitePolicy,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            domain: None,
            secure: default_secure(),
            same_site: SameSitePolicy::default(),
        }
    }
}

fn default_secure() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    #[default]
    None,
    Lax,
    Strict,
}

impl From<SameSitePolicy> for SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::None => SameSite::None,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::Strict => SameSite::Strict,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }
}
