/// Configuration management for Tessera
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub email: Option<EmailConfig>,
    pub password_reset: PasswordResetConfig,
    pub rate_limit: RateLimitConfig,
    pub bootstrap: Option<BootstrapAdmin>,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL used in emailed links and card QR payloads
    pub public_url: String,
    pub association_name: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub ttl_hours: i64,
    pub secure_cookies: bool,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// Password reset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetConfig {
    /// Show the reset link in the page when it could not be mailed.
    /// Development fallback only.
    pub expose_link_fallback: bool,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub anonymous_posts_per_minute: u32,
}

/// First administrator, created when the user table is empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapAdmin {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("TESSERA_HOSTNAME").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("TESSERA_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid port number".to_string()))?;
        let public_url = env::var("TESSERA_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port))
            .trim_end_matches('/')
            .to_string();
        let association_name =
            env::var("TESSERA_ASSOCIATION_NAME").unwrap_or_else(|_| "Tessera".to_string());

        let data_directory: PathBuf = env::var("TESSERA_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("TESSERA_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("tessera.sqlite"));

        let ttl_hours = env::var("TESSERA_SESSION_TTL_HOURS")
            .unwrap_or_else(|_| "12".to_string())
            .parse()
            .map_err(|_| AppError::Validation("Invalid session TTL".to_string()))?;
        let secure_cookies = env::var("TESSERA_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);

        let email = if let Ok(smtp_url) = env::var("TESSERA_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("TESSERA_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let expose_link_fallback = env::var("TESSERA_DEV_RESET_LINKS")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        let rate_limit_enabled = env::var("TESSERA_RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let anonymous_posts_per_minute = env::var("TESSERA_ANONYMOUS_POSTS_PER_MINUTE")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let bootstrap = match (
            env::var("TESSERA_BOOTSTRAP_ADMIN_EMAIL"),
            env::var("TESSERA_BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "tessera=debug,tower_http=debug".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                association_name,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            session: SessionConfig {
                ttl_hours,
                secure_cookies,
            },
            email,
            password_reset: PasswordResetConfig {
                expose_link_fallback,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                anonymous_posts_per_minute,
            },
            bootstrap,
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.service.hostname.is_empty() {
            return Err(AppError::Validation("Hostname cannot be empty".to_string()));
        }

        if !self.service.public_url.starts_with("http://")
            && !self.service.public_url.starts_with("https://")
        {
            return Err(AppError::Validation(
                "Public URL must start with http:// or https://".to_string(),
            ));
        }

        if self.session.ttl_hours <= 0 {
            return Err(AppError::Validation(
                "Session TTL must be positive".to_string(),
            ));
        }

        if let Some(ref admin) = self.bootstrap {
            if admin.password.len() < 8 {
                return Err(AppError::Validation(
                    "Bootstrap admin password must be at least 8 characters".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Configuration used by tests: in-memory friendly, no mail
    #[cfg(test)]
    pub fn for_tests() -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 8080,
                public_url: "http://localhost:8080".to_string(),
                association_name: "Test Association".to_string(),
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database: PathBuf::from(":memory:"),
            },
            session: SessionConfig {
                ttl_hours: 12,
                secure_cookies: false,
            },
            email: None,
            password_reset: PasswordResetConfig {
                expose_link_fallback: true,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                anonymous_posts_per_minute: 30,
            },
            bootstrap: None,
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
