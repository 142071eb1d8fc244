use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Origin of the web client, used for CORS and links in emails
    #[serde(default = "default_client_url")]
    pub client_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            client_url: default_client_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_client_url() -> String {
    "http://localhost:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for signing session tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Lifetime of a password reset code
    #[serde(default = "default_otp_ttl_minutes")]
    pub otp_ttl_minutes: i64,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,
    #[serde(skip)]
    pub generated_secret: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_ttl_days: default_token_ttl_days(),
            otp_ttl_minutes: default_otp_ttl_minutes(),
            min_password_length: default_min_password_length(),
            generated_secret: true,
        }
    }
}

fn default_jwt_secret() -> String {
    // Random per process unless configured; tokens will not survive restarts
    uuid::Uuid::new_v4().to_string()
}

fn default_token_ttl_days() -> i64 {
    7
}

fn default_otp_ttl_minutes() -> i64 {
    5
}

fn default_min_password_length() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Send through SMTP. When false, outgoing mail is only logged.
    #[serde(default)]
    pub enabled: bool,
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default = "default_smtp_tls")]
    pub smtp_tls: bool,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub from_address: Option<String>,
    #[serde(default = "default_from_name")]
    pub from_name: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_tls: default_smtp_tls(),
            smtp_username: None,
            smtp_password: None,
            from_address: None,
            from_name: default_from_name(),
        }
    }
}

impl EmailConfig {
    /// SMTP delivery needs at least a host and a sender address
    pub fn is_configured(&self) -> bool {
        self.enabled && self.smtp_host.is_some() && self.from_address.is_some()
    }
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_tls() -> bool {
    true
}

fn default_from_name() -> String {
    "Tripmate".to_string()
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

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Requests per window for login, registration and password reset
    #[serde(default = "default_auth_requests")]
    pub auth_requests_per_window: u32,
    /// Requests per window for authenticated API endpoints
    #[serde(default = "default_api_requests")]
    pub api_requests_per_window: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Seconds between sweeps of stale limiter entries
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval: u64,
    /// Key clients on X-Forwarded-For / X-Real-IP instead of the peer
    /// address. Only enable behind a proxy that overwrites those headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            auth_requests_per_window: default_auth_requests(),
            api_requests_per_window: default_api_requests(),
            window_seconds: default_window_seconds(),
            cleanup_interval: default_cleanup_interval(),
            trust_proxy_headers: false,
        }
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_auth_requests() -> u32 {
    20
}

fn default_api_requests() -> u32 {
    300
}

fn default_window_seconds() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        config.auth.generated_secret = !content_sets_jwt_secret(content);
        Ok(config)
    }

    /// Secrets may come from the environment instead of the config file
    fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("TRIPMATE_JWT_SECRET") {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
                self.auth.generated_secret = false;
            }
        }
        if let Ok(username) = std::env::var("TRIPMATE_SMTP_USERNAME") {
            self.email.smtp_username = Some(username);
        }
        if let Ok(password) = std::env::var("TRIPMATE_SMTP_PASSWORD") {
            self.email.smtp_password = Some(password);
        }
    }
}

fn content_sets_jwt_secret(content: &str) -> bool {
    toml::from_str::<toml::Table>(content)
        .ok()
        .and_then(|table| table.get("auth").and_then(|a| a.get("jwt_secret")).cloned())
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.token_ttl_days, 7);
        assert_eq!(config.auth.otp_ttl_minutes, 5);
        assert!(!config.email.enabled);
        assert!(config.auth.generated_secret);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [auth]
            jwt_secret = "s3cret"

            [email]
            enabled = true
            smtp_host = "smtp.example.com"
            from_address = "trips@example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert!(!config.auth.generated_secret);
        assert!(config.email.is_configured());
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn test_email_needs_host_and_sender() {
        let mut email = EmailConfig {
            enabled: true,
            ..EmailConfig::default()
        };
        assert!(!email.is_configured());
        email.smtp_host = Some("smtp.example.com".to_string());
        assert!(!email.is_configured());
        email.from_address = Some("a@example.com".to_string());
        assert!(email.is_configured());
    }

    #[test]
    fn test_proxy_headers_are_opt_in() {
        assert!(!Config::default().rate_limit.trust_proxy_headers);

        let config = Config::from_toml("[rate_limit]\ntrust_proxy_headers = true\n").unwrap();
        assert!(config.rate_limit.trust_proxy_headers);
        assert_eq!(config.rate_limit.auth_requests_per_window, 20);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(Config::from_toml("[server\nport = ").is_err());
    }
}
