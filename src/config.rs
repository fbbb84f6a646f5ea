/// Configuration management for Client Pulse
use crate::error::{PulseError, PulseResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Origins always admitted in addition to `CORS_ORIGIN`
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "client_pulse=debug,tower_http=debug";

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub registration: RegistrationConfig,
    pub email: Option<EmailConfig>,
    pub cors: CorsConfig,
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

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Access token lifetime in hours
    pub token_ttl_hours: i64,
}

/// OTP signup configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Lifetime of a pending registration in seconds
    pub otp_ttl_seconds: i64,
    /// Failed verifications tolerated per pending registration
    pub otp_max_attempts: u32,
    /// How often the reaper purges expired pending registrations
    pub reaper_interval_seconds: u64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Cross-origin configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub credential_requests_per_minute: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PulseResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PULSE_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .or_else(|_| env::var("PULSE_PORT"))
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| PulseError::Validation("Invalid port number".to_string()))?;
        let version = env!("CARGO_PKG_VERSION").to_string();

        let database_path = env::var("DATABASE_URL")
            .or_else(|_| env::var("PULSE_DATABASE_PATH"))
            .map(|s| PathBuf::from(s.trim_start_matches("sqlite://")))
            .unwrap_or_else(|_| PathBuf::from("./data/pulse.sqlite"));

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| PulseError::Validation("JWT secret required".to_string()))?;
        let token_ttl_hours = env::var("PULSE_TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .map_err(|_| PulseError::Validation("Invalid token TTL".to_string()))?;

        let otp_ttl_seconds = env_setting("PULSE_OTP_TTL_SECONDS", 600)?;
        let otp_max_attempts = env_setting("PULSE_OTP_MAX_ATTEMPTS", 5)?;
        let reaper_interval_seconds = env_setting("PULSE_REAPER_INTERVAL_SECONDS", 60)?;

        let email = if let Ok(smtp_url) = env::var("PULSE_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("PULSE_MAIL_FROM")
                    .unwrap_or_else(|_| format!("donotreply@{}", hostname)),
            })
        } else {
            None
        };

        // Extra origins from comma-separated list
        let mut allowed_origins: Vec<String> =
            DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect();
        allowed_origins.extend(
            env::var("CORS_ORIGIN")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );

        let rate_limit_enabled = env_setting("PULSE_RATE_LIMIT_ENABLED", true)?;
        let credential_requests_per_minute =
            env_setting("PULSE_RATE_LIMIT_CREDENTIAL_PER_MINUTE", 60)?;

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig { database_path },
            authentication: AuthConfig {
                jwt_secret,
                token_ttl_hours,
            },
            registration: RegistrationConfig {
                otp_ttl_seconds,
                otp_max_attempts,
                reaper_interval_seconds,
            },
            email,
            cors: CorsConfig { allowed_origins },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                credential_requests_per_minute,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> PulseResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PulseError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(PulseError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.token_ttl_hours <= 0 {
            return Err(PulseError::Validation("Token TTL must be positive".to_string()));
        }

        if self.registration.otp_ttl_seconds <= 0 {
            return Err(PulseError::Validation("OTP TTL must be positive".to_string()));
        }

        if self.registration.otp_max_attempts == 0 {
            return Err(PulseError::Validation(
                "OTP attempt limit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration used by tests and local tooling: in-memory database, no SMTP
    pub fn for_testing() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 5000,
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            storage: StorageConfig {
                database_path: PathBuf::from(":memory:"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                token_ttl_hours: 24,
            },
            registration: RegistrationConfig {
                otp_ttl_seconds: 600,
                otp_max_attempts: 5,
                reaper_interval_seconds: 60,
            },
            email: None,
            cors: CorsConfig {
                allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|s| s.to_string()).collect(),
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                credential_requests_per_minute: 60,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

/// Read an optional setting; a present but unparseable value is an error
fn env_setting<T: FromStr>(name: &str, default: T) -> PulseResult<T> {
    parse_setting(name, env::var(name).ok(), default)
}

fn parse_setting<T: FromStr>(name: &str, raw: Option<String>, default: T) -> PulseResult<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| PulseError::Validation(format!("Invalid value for {}: {:?}", name, value))),
    }
}
