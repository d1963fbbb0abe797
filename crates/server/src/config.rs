//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFORGE_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `HOSTING_API_TOKEN` - Hosting provider API token (can add/remove project domains)
//! - `HOSTING_PROJECT_ID` - Provider project that serves generated storefronts
//!
//! ## Optional
//! - `STOREFORGE_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFORGE_PORT` - Listen port (default: 3002)
//! - `HOSTING_API_URL` - Provider API base URL (default: <https://api.vercel.com>)
//! - `HOSTING_TEAM_ID` - Provider team scope, appended as `teamId`
//! - `HOSTING_TIMEOUT_SECS` - Per-call timeout (default: 10)
//! - `HOSTING_MAX_RETRIES` - Retries for transient provider failures (default: 2)
//! - `HOSTING_RETRY_BASE_MS` - First backoff delay, doubled per retry (default: 250)
//! - `DNS_RECORD_TTL` - TTL suggested in DNS instructions (default: 3600)
//! - `VERIFY_CONCURRENCY` - Parallel provider checks during a batch refresh (default: 4)
//! - `VERIFY_INTERVAL_SECS` - Background refresh period, 0 disables (default: 0)
//! - `VERIFY_INCLUDE_ERRORS` - Background refresh also retries `error` domains (default: false)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` / `SENTRY_TRACES_SAMPLE_RATE` - Sample rates (default: 1.0)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "https://api.vercel.com";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` URL; holds credentials
    pub database_url: SecretString,
    /// Bind address
    pub host: IpAddr,
    /// Bind port
    pub port: u16,
    /// Hosting provider settings
    pub hosting: HostingConfig,
    /// Verification engine settings
    pub verification: VerificationConfig,
    /// Sentry DSN; Sentry stays off without it
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of requests traced
    pub sentry_traces_sample_rate: f32,
}

/// Credentials for one hosting provider project.
///
/// Passed explicitly into the gateway client; nothing reads provider
/// credentials from ambient state. Implements `Debug` manually to redact the
/// token.
#[derive(Clone)]
pub struct ProviderAccount {
    /// API bearer token
    pub api_token: SecretString,
    /// Project that owns the custom domains
    pub project_id: String,
    /// Optional team scope
    pub team_id: Option<String>,
}

impl std::fmt::Debug for ProviderAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderAccount")
            .field("api_token", &"[REDACTED]")
            .field("project_id", &self.project_id)
            .field("team_id", &self.team_id)
            .finish()
    }
}

/// Hosting provider client configuration.
#[derive(Debug, Clone)]
pub struct HostingConfig {
    /// API base URL
    pub api_url: Url,
    /// Project credentials
    pub account: ProviderAccount,
    /// Timeout applied to every provider call
    pub timeout: Duration,
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,
    /// Backoff before the first retry
    pub retry_base_delay: Duration,
    /// TTL suggested in DNS instructions
    pub record_ttl: u32,
}

/// Verification engine configuration.
#[derive(Debug, Clone)]
pub struct VerificationConfig {
    /// Maximum in-flight provider checks during a batch refresh
    pub concurrency: usize,
    /// Background refresh period; `None` disables the task
    pub interval: Option<Duration>,
    /// Whether the background refresh also re-checks `error` domains
    pub include_errors: bool,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            interval: None,
            include_errors: false,
        }
    }
}

impl ServerConfig {
    /// Read the full server configuration, after loading `.env` if one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFORGE_DATABASE_URL")?;
        let host = parse_env("STOREFORGE_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFORGE_PORT", "3002")?;
        let hosting = HostingConfig::from_env()?;
        let verification = VerificationConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            host,
            port,
            hosting,
            verification,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl HostingConfig {
    /// Load the hosting provider section on its own (used by the CLI).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = get_env_or_default("HOSTING_API_URL", DEFAULT_API_URL);
        let api_url = Url::parse(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("HOSTING_API_URL".to_string(), e.to_string()))?;

        let account = ProviderAccount {
            api_token: get_required_secret("HOSTING_API_TOKEN")?,
            project_id: get_required_env("HOSTING_PROJECT_ID")?,
            team_id: get_optional_env("HOSTING_TEAM_ID"),
        };

        let timeout_secs: u64 = parse_env("HOSTING_TIMEOUT_SECS", "10")?;
        let retry_base_ms: u64 = parse_env("HOSTING_RETRY_BASE_MS", "250")?;

        Ok(Self {
            api_url,
            account,
            timeout: Duration::from_secs(timeout_secs),
            max_retries: parse_env("HOSTING_MAX_RETRIES", "2")?,
            retry_base_delay: Duration::from_millis(retry_base_ms),
            record_ttl: parse_env("DNS_RECORD_TTL", "3600")?,
        })
    }
}

impl VerificationConfig {
    /// Load the verification section on its own.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let concurrency: usize = parse_env("VERIFY_CONCURRENCY", "4")?;
        if concurrency == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "VERIFY_CONCURRENCY".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let interval_secs: u64 = parse_env("VERIFY_INTERVAL_SECS", "0")?;
        let interval = (interval_secs > 0).then(|| Duration::from_secs(interval_secs));

        Ok(Self {
            concurrency,
            interval,
            include_errors: parse_env("VERIFY_INCLUDE_ERRORS", "false")?,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither variable is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Unset and empty both count as absent.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable (or its default) into `T`.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hosting() -> HostingConfig {
        HostingConfig {
            api_url: Url::parse(DEFAULT_API_URL).unwrap(),
            account: ProviderAccount {
                api_token: SecretString::from("tok_live_abc123"),
                project_id: "prj_storefronts".to_string(),
                team_id: Some("team_42".to_string()),
            },
            timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(250),
            record_ttl: 3600,
        }
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3002,
            hosting: hosting(),
            verification: VerificationConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 1.0,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
    }

    #[test]
    fn test_provider_account_debug_redacts_token() {
        let debug_output = format!("{:?}", hosting().account);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(debug_output.contains("prj_storefronts"));
        assert!(!debug_output.contains("tok_live_abc123"));
    }

    #[test]
    fn test_hosting_config_debug_redacts_token() {
        let debug_output = format!("{:?}", hosting());
        assert!(!debug_output.contains("tok_live_abc123"));
    }

    #[test]
    fn test_parse_value_reports_key() {
        let err = parse_value::<u16>("STOREFORGE_PORT", "not-a-port").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "STOREFORGE_PORT"));
    }

    #[test]
    fn test_parse_value_trims() {
        let value: bool = parse_value("VERIFY_INCLUDE_ERRORS", " true ").unwrap();
        assert!(value);
    }

    #[test]
    fn test_verification_defaults() {
        let config = VerificationConfig::default();
        assert_eq!(config.concurrency, 4);
        assert!(config.interval.is_none());
        assert!(!config.include_errors);
    }
}
