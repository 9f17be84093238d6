//! Server configuration.
//!
//! Every setting can be given as a flag or through the environment (a `.env`
//! file is loaded before parsing).
//!
//! Environment:
//!   PORT - Listen port (default: 8083)
//!   AUTH_DB_PATH - SQLite file holding user accounts
//!   JWT_SECRET - HMAC secret for session tokens
//!   RATE_LIMIT_RPS / RATE_LIMIT_BURST - Per-IP token bucket (default: 1 / 5)
//!   CORS_ALLOWED_ORIGINS - Comma-separated origin allow-list
//!   ADMIN_EMAIL / ADMIN_PASSWORD - Seed a superadmin into an empty database

use crate::middleware::RateLimitConfig;
use clap::Parser;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("JWT_SECRET must not be empty")]
    EmptySecret,
    #[error("TOKEN_TTL_HOURS must be positive (got {0})")]
    InvalidTokenTtl(i64),
    #[error("RATE_LIMIT_RPS must be positive (got {0})")]
    InvalidRefillRate(f64),
    #[error("RATE_LIMIT_BURST must be at least 1")]
    InvalidBurst,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "admin-server")]
#[command(about = "Admin backend - authentication and user records over HTTP")]
pub struct AppConfig {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value = "8083")]
    pub port: u16,

    /// SQLite database with the users table
    #[arg(long, env = "AUTH_DB_PATH", default_value = "admin_backend.db")]
    pub db_path: String,

    /// Secret used to sign session tokens
    #[arg(
        long,
        env = "JWT_SECRET",
        default_value = "dev-secret-change-in-production-minimum-32-characters",
        hide_env_values = true
    )]
    pub jwt_secret: String,

    /// Session token lifetime in hours
    #[arg(long, env = "TOKEN_TTL_HOURS", default_value = "24")]
    pub token_ttl_hours: i64,

    /// Tokens refilled per second for each client IP
    #[arg(long, env = "RATE_LIMIT_RPS", default_value = "1")]
    pub rate_limit_rps: f64,

    /// Burst capacity for each client IP
    #[arg(long, env = "RATE_LIMIT_BURST", default_value = "5")]
    pub rate_limit_burst: u32,

    /// Origins allowed for CORS (comma-separated)
    #[arg(
        long,
        env = "CORS_ALLOWED_ORIGINS",
        value_delimiter = ',',
        default_value = "http://localhost:8083,http://localhost:8084"
    )]
    pub cors_allowed_origins: Vec<String>,

    /// Seconds in-flight requests get to finish after a shutdown signal
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value = "1")]
    pub shutdown_grace_secs: u64,

    /// Email of the superadmin seeded into an empty database
    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Password of the seeded superadmin
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Display name of the seeded superadmin
    #[arg(long, env = "ADMIN_NAME", default_value = "Administrator")]
    pub admin_name: String,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.token_ttl_hours <= 0 {
            return Err(ConfigError::InvalidTokenTtl(self.token_ttl_hours));
        }
        if !(self.rate_limit_rps > 0.0) {
            return Err(ConfigError::InvalidRefillRate(self.rate_limit_rps));
        }
        if self.rate_limit_burst == 0 {
            return Err(ConfigError::InvalidBurst);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            refill_per_sec: self.rate_limit_rps,
            burst: self.rate_limit_burst,
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Credentials for the bootstrap admin, when both are configured.
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (self.admin_email.as_deref(), self.admin_password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        }
    }
}
