/// Configuration management for the Subguard login gate
use crate::error::{GateError, GateResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub store: StoreConfig,
    pub provider: ProviderConfig,
    pub access: AccessPolicy,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Device registry storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_directory: PathBuf,
    pub device_db: PathBuf,
}

/// External auth provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the provider's auth REST surface
    pub base_url: String,
    /// Publishable API key sent with every provider request
    pub anon_key: String,
    /// Shared secret the provider signs session JWTs with (HS256)
    pub jwt_secret: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

/// Who may authenticate at all.
///
/// The dashboard is effectively single-tenant; the permitted operator
/// account(s) are injected here instead of living as a literal in the
/// login flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub allowed_emails: Vec<String>,
}

impl AccessPolicy {
    pub fn new(allowed_emails: Vec<String>) -> Self {
        Self { allowed_emails }
    }

    /// Case-insensitive membership check
    pub fn permits(&self, email: &str) -> bool {
        let candidate = email.to_lowercase();
        self.allowed_emails
            .iter()
            .any(|allowed| allowed.to_lowercase() == candidate)
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Credential attempts (sign-in/sign-up) allowed per minute
    pub credential_attempts_per_minute: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Parse a comma-separated email list from an environment value
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> GateResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("SUBGUARD_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("SUBGUARD_PORT")
            .unwrap_or_else(|_| "8460".to_string())
            .parse()
            .map_err(|_| GateError::Validation("Invalid port number".to_string()))?;
        let version = env::var("SUBGUARD_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("SUBGUARD_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let device_db = env::var("SUBGUARD_DEVICE_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("devices.sqlite"));

        let provider_base_url = env::var("SUBGUARD_PROVIDER_URL")
            .map_err(|_| GateError::Validation("Auth provider URL required".to_string()))?;
        let provider_anon_key = env::var("SUBGUARD_PROVIDER_ANON_KEY")
            .map_err(|_| GateError::Validation("Auth provider API key required".to_string()))?;
        let provider_jwt_secret = env::var("SUBGUARD_PROVIDER_JWT_SECRET")
            .map_err(|_| GateError::Validation("Auth provider JWT secret required".to_string()))?;
        let provider_timeout_secs = env::var("SUBGUARD_PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        // Parse allowed emails from comma-separated list
        let allowed_emails =
            parse_email_list(&env::var("SUBGUARD_ALLOWED_EMAILS").unwrap_or_default());

        let rate_limit_enabled = env::var("SUBGUARD_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let credential_attempts_per_minute = env::var("SUBGUARD_CREDENTIAL_ATTEMPTS_PER_MINUTE")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let burst_size = env::var("SUBGUARD_RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            store: StoreConfig {
                data_directory,
                device_db,
            },
            provider: ProviderConfig {
                base_url: provider_base_url,
                anon_key: provider_anon_key,
                jwt_secret: provider_jwt_secret,
                timeout_secs: provider_timeout_secs,
            },
            access: AccessPolicy::new(allowed_emails),
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                credential_attempts_per_minute,
                burst_size,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> GateResult<()> {
        if self.service.hostname.is_empty() {
            return Err(GateError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.provider.jwt_secret.len() < 32 {
            return Err(GateError::Validation(
                "Provider JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.access.allowed_emails.is_empty() {
            return Err(GateError::Validation(
                "At least one allowed email must be configured".to_string(),
            ));
        }

        Ok(())
    }
}
