//! Configuration loading, validation, and management for colonylab.
//!
//! Settings come from three layers, lowest priority first:
//! built-in defaults, an optional TOML file, then environment variables
//! (after `.env` has been loaded). Validation runs once at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Application name reported by the API
    #[serde(default = "default_name")]
    pub name: String,

    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    /// Override for the bundled prompt file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts_path: Option<PathBuf>,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub mail: MailConfig,

    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_name() -> String {
    "colonylab".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("name", &self.name)
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("prompts_path", &self.prompts_path)
            .field("model", &self.model)
            .field("gateway", &self.gateway)
            .field("mail", &self.mail)
            .field("database", &self.database)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub name: String,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4.1-mini".into()
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_secs() -> u64 {
    3
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            name: default_model(),
            temperature: 0.0,
            max_tokens: None,
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// How long a completion result is served from cache
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8688
}
fn default_cache_ttl_secs() -> u64 {
    60
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resend_api_key: Option<String>,

    #[serde(default = "default_mail_from")]
    pub from: String,

    /// Recipient used when no team member matches the name on a sign
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_to: Option<String>,

    /// Always copied on review requests
    #[serde(default)]
    pub cc: Vec<String>,
}

fn default_mail_from() -> String {
    "Laboratory <contact@example.com>".into()
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            resend_api_key: None,
            from: default_mail_from(),
            fallback_to: None,
            cc: Vec::new(),
        }
    }
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("resend_api_key", &redact(&self.resend_api_key))
            .field("from", &self.from)
            .field("fallback_to", &self.fallback_to)
            .field("cc", &self.cc)
            .finish()
    }
}

/// Cloudflare D1 credentials.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("api_token", &redact(&self.api_token))
            .field("account_id", &self.account_id)
            .field("database_id", &self.database_id)
            .finish()
    }
}

/// Fully populated D1 credentials.
#[derive(Clone)]
pub struct D1Credentials {
    pub api_token: String,
    pub account_id: String,
    pub database_id: String,
}

impl Settings {
    /// Load settings: `.env`, then the optional TOML file, then environment
    /// variable overrides.
    ///
    /// The file path is `path` when given, else `COLONYLAB_CONFIG` when set.
    /// A missing `.env` is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(p) => tracing::debug!(path = %p.display(), "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env"),
        }

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("COLONYLAB_CONFIG").map(PathBuf::from));

        let mut settings = match file {
            Some(p) => Self::load_from(&p)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a specific TOML file, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    /// Empty values are treated as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("APP_NAME") {
            self.name = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = get("MODEL_BASE_URL") {
            self.model.base_url = v;
        }
        if let Some(v) = get("MODEL_NAME") {
            self.model.name = v;
        }
        if let Some(v) = get("PROMPTS_PATH") {
            self.prompts_path = Some(PathBuf::from(v));
        }
        if let Some(v) = get("HOST") {
            self.gateway.host = v;
        }
        if let Some(v) = get("PORT") {
            self.gateway.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = get("CACHE_TTL_SECS") {
            self.gateway.cache_ttl_secs = parse_env("CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = get("MAX_UPLOAD_BYTES") {
            self.gateway.max_upload_bytes = parse_env("MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = get("RESEND_API_KEY") {
            self.mail.resend_api_key = Some(v);
        }
        if let Some(v) = get("MAIL_FROM") {
            self.mail.from = v;
        }
        if let Some(v) = get("MAIL_FALLBACK_TO") {
            self.mail.fallback_to = Some(v);
        }
        if let Some(v) = get("MAIL_CC") {
            self.mail.cc = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = get("CLOUDFLARE_API_TOKEN") {
            self.database.api_token = Some(v);
        }
        if let Some(v) = get("CLOUDFLARE_ACCOUNT_ID") {
            self.database.account_id = Some(v);
        }
        if let Some(v) = get("CLOUDFLARE_DB_ID") {
            self.database.database_id = Some(v);
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.gateway.port == 0 {
            return Err(ConfigError::ValidationError("gateway.port must be > 0".into()));
        }

        if self.gateway.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "gateway.max_upload_bytes must be > 0".into(),
            ));
        }

        if self.model.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "model.max_retries must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// The model API key, or an error explaining that serving is impossible
    /// without one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or(ConfigError::MissingApiKey)
    }

    /// D1 credentials, when all three parts are configured.
    pub fn database(&self) -> Option<D1Credentials> {
        Some(D1Credentials {
            api_token: self.database.api_token.clone()?,
            account_id: self.database.account_id.clone()?,
            database_id: self.database.database_id.clone()?,
        })
    }

    /// The service version, taken from the crate metadata.
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name: default_name(),
            openai_api_key: None,
            prompts_path: None,
            model: ModelConfig::default(),
            gateway: GatewayConfig::default(),
            mail: MailConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No OpenAI key provided. Cannot initialize LLM client.")]
    MissingApiKey,
}
