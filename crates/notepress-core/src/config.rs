use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{NotepressError, Result};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_CONTENT_DIR: &str = "content/notes";
pub const DEFAULT_GITHUB_API: &str = "https://api.github.com";
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_CONCURRENCY: usize = 2;

/// Top-level config (notepress.toml + NOTEPRESS_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotepressConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Periodic trigger settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronConfig {
    /// Shared secret expected as `Authorization: Bearer <secret>`.
    /// When unset the trigger endpoint accepts any caller.
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// GitHub repository accessed over the REST API.
    #[default]
    Github,
    /// Process-local map; contents are lost on restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Upper bound for any single store operation.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    pub github: Option<GitHubConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            github: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Fine-grained token with `contents: write` on the repository.
    pub token: String,
    /// Repository directory holding `<slug>.md` files.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,
    #[serde(default = "default_github_api")]
    pub api_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Commit attempts per note before giving up on write conflicts.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Notes published in parallel within one batch (clamped to 1..=4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}
fn default_content_dir() -> String {
    DEFAULT_CONTENT_DIR.to_string()
}
fn default_github_api() -> String {
    DEFAULT_GITHUB_API.to_string()
}
fn default_store_timeout_ms() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

impl NotepressConfig {
    /// Load config from a TOML file with NOTEPRESS_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. NOTEPRESS_CONFIG env var
    ///   3. ~/.notepress/notepress.toml
    ///
    /// Nested keys are addressed with a double underscore, e.g.
    /// `NOTEPRESS_CRON__SECRET` or `NOTEPRESS_STORE__GITHUB__TOKEN`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("NOTEPRESS_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        if !std::path::Path::new(&path).exists() {
            warn!(%path, "config file not found, using defaults and env overrides");
        }

        let config: NotepressConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("NOTEPRESS_").ignore(&["CONFIG"]).split("__"))
            .extract()
            .map_err(|e| NotepressError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that cannot produce a working store.
    pub fn validate(&self) -> Result<()> {
        if self.store.backend == StoreBackend::Github && self.store.github.is_none() {
            return Err(NotepressError::Config(
                "store.backend = \"github\" requires a [store.github] section".to_string(),
            ));
        }
        if self.publish.max_attempts == 0 {
            return Err(NotepressError::Config(
                "publish.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.notepress/notepress.toml", home)
}
