use cospace_core::invite::DEFAULT_INVITE_TTL_DAYS;
use cospace_core::locks::DEFAULT_LOCK_TTL_SECS;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Invite lifetime in days (default: `7`).
    pub invite_ttl_days: i64,
    /// Base URL used to build invite links sent to clients.
    pub invite_base_url: String,
    /// Lock lifetime in seconds when the caller does not specify one.
    pub default_lock_ttl_secs: i64,
    /// How often the expired-lock sweep runs, in seconds (default: `60`).
    pub lock_sweep_interval_secs: u64,
    /// How often the expired-invite sweep runs, in seconds (default: `3600`).
    pub invite_sweep_interval_secs: u64,
    /// JWT token configuration (secret, expiry duration).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                           |
    /// |------------------------------|-----------------------------------|
    /// | `HOST`                       | `0.0.0.0`                         |
    /// | `PORT`                       | `3000`                            |
    /// | `CORS_ORIGINS`               | `http://localhost:5173`           |
    /// | `REQUEST_TIMEOUT_SECS`       | `30`                              |
    /// | `SHUTDOWN_TIMEOUT_SECS`      | `30`                              |
    /// | `INVITE_TTL_DAYS`            | `7`                               |
    /// | `INVITE_BASE_URL`            | `http://localhost:5173/invites`   |
    /// | `DEFAULT_LOCK_TTL_SECS`      | `300`                             |
    /// | `LOCK_SWEEP_INTERVAL_SECS`   | `60`                              |
    /// | `INVITE_SWEEP_INTERVAL_SECS` | `3600`                            |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let invite_ttl_days: i64 = std::env::var("INVITE_TTL_DAYS")
            .unwrap_or_else(|_| DEFAULT_INVITE_TTL_DAYS.to_string())
            .parse()
            .expect("INVITE_TTL_DAYS must be a valid i64");

        let invite_base_url = std::env::var("INVITE_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5173/invites".into());

        let default_lock_ttl_secs: i64 = std::env::var("DEFAULT_LOCK_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_LOCK_TTL_SECS.to_string())
            .parse()
            .expect("DEFAULT_LOCK_TTL_SECS must be a valid i64");

        let lock_sweep_interval_secs: u64 = std::env::var("LOCK_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("LOCK_SWEEP_INTERVAL_SECS must be a valid u64");

        let invite_sweep_interval_secs: u64 = std::env::var("INVITE_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("INVITE_SWEEP_INTERVAL_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            invite_ttl_days,
            invite_base_url,
            default_lock_ttl_secs,
            lock_sweep_interval_secs,
            invite_sweep_interval_secs,
            jwt,
        }
    }

    /// The URL an invited user follows to resolve their invite.
    pub fn invite_url(&self, token: &str) -> String {
        format!("{}/{token}", self.invite_base_url.trim_end_matches('/'))
    }
}
