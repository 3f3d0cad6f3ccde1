//! Application configuration.
//!
//! Loaded from TOML; secrets may be overridden from the environment so the
//! config file can be committed without credentials.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "FITCOACH_CONFIG";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path (database, avatars)
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// HTTP server settings
    pub server: ServerSettings,
    /// Authentication settings
    pub auth: AuthSettings,
    /// AI assistant settings
    pub assistant: AssistantSettings,
    /// Billing settings
    pub billing: BillingSettings,
    /// Affiliate program settings
    pub affiliate: AffiliateSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            assistant: AssistantSettings::default(),
            billing: BillingSettings::default(),
            affiliate: AffiliateSettings::default(),
        }
    }
}

impl AppConfig {
    /// Path of the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("fitcoach.db")
    }

    /// Directory backing the avatar bucket.
    pub fn avatar_dir(&self) -> PathBuf {
        self.data_dir.join("avatars")
    }

    /// Apply secret overrides from environment variables.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("FITCOACH_SESSION_SECRET") {
            self.auth.session_secret = secret;
        }
        if let Ok(key) = std::env::var("FITCOACH_LLM_API_KEY") {
            self.assistant.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("FITCOACH_ASAAS_API_KEY") {
            self.billing.api_key = Some(key);
        }
        if let Ok(token) = std::env::var("FITCOACH_ASAAS_WEBHOOK_TOKEN") {
            self.billing.webhook_token = Some(token);
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub bind_addr: String,
    /// Public site URL, used in emails
    pub site_url: String,
    /// Maximum request body size in bytes
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            site_url: "http://localhost:5173".to_string(),
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret for session tokens
    pub session_secret: String,
    /// Session lifetime in hours
    pub session_ttl_hours: u32,
    /// Emails granted admin access
    pub admin_emails: Vec<String>,
    /// Free trial window after sign-up, in hours
    pub trial_hours: u32,
    /// PBKDF2 iterations for new password hashes
    pub password_iterations: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_secret: "change-me".to_string(),
            session_ttl_hours: 24 * 7,
            admin_emails: Vec::new(),
            trial_hours: 24,
            password_iterations: 100_000,
        }
    }
}

/// AI assistant (chat-completion API) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSettings {
    /// API key; assistants answer with a fallback when absent
    pub api_key: Option<String>,
    /// API base URL
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Number of trailing conversation turns sent with each request
    pub history_turns: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            history_turns: 10,
            timeout_secs: 30,
        }
    }
}

/// Payment gateway and subscription settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Gateway API key
    pub api_key: Option<String>,
    /// Gateway base URL
    pub base_url: String,
    /// Shared secret expected on webhook calls
    pub webhook_token: Option<String>,
    /// Monthly plan price in cents (BRL)
    pub monthly_price_cents: i64,
    /// PIX key used for locally built payloads
    pub pix_key: String,
    /// Merchant name embedded in PIX payloads
    pub merchant_name: String,
    /// Merchant city embedded in PIX payloads
    pub merchant_city: String,
    /// QR code fetch attempts before falling back
    pub qr_poll_attempts: u32,
    /// Delay between QR code fetch attempts
    pub qr_poll_delay_ms: u64,
    /// Length of a paid period in days
    pub period_days: i64,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.asaas.com/v3".to_string(),
            webhook_token: None,
            monthly_price_cents: 2990,
            pix_key: "pagamentos@fitcoach.app".to_string(),
            merchant_name: "FitCoach".to_string(),
            merchant_city: "Sao Paulo".to_string(),
            qr_poll_attempts: 10,
            qr_poll_delay_ms: 2000,
            period_days: 30,
        }
    }
}

/// Affiliate program settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AffiliateSettings {
    /// Share of each converted payment credited to the affiliate
    pub commission_rate: f64,
}

impl Default for AffiliateSettings {
    fn default() -> Self {
        Self {
            commission_rate: 0.30,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("app", "fitcoach", "FitCoach")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| get_data_dir().join("config.toml"))
}

/// Load application configuration from file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let mut config = load_config_from(&get_config_path())?;
    config.apply_env_overrides();
    Ok(config)
}

/// Load configuration from an explicit path; a missing file yields defaults.
pub fn load_config_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
    let mut config = parse_config(&content)?;

    config.data_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(get_data_dir);

    Ok(config)
}

/// Parse configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Save application configuration to file.
pub fn save_config(config: &AppConfig, path: &std::path::Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
