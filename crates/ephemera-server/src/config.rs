use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("EPHEMERA_JWT_SECRET is unset or still a placeholder")]
    InsecureSecret,

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    /// SQLite busy timeout; a store call that waits longer fails.
    pub store_timeout: Duration,
    pub sweep_interval: Duration,
    pub public_base_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("EPHEMERA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::InsecureSecret);
        }

        let host = lookup("EPHEMERA_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("EPHEMERA_PORT").unwrap_or_else(|| "3000".into());
        let addr_raw = format!("{}:{}", host, port);
        let addr: SocketAddr = addr_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "EPHEMERA_HOST/EPHEMERA_PORT",
            value: addr_raw.clone(),
        })?;

        let db_path = lookup("EPHEMERA_DB_PATH")
            .unwrap_or_else(|| "ephemera.db".into())
            .into();

        let store_timeout =
            Duration::from_millis(parse_or(&lookup, "EPHEMERA_STORE_TIMEOUT_MS", 5_000)?);
        let sweep_interval =
            Duration::from_secs(parse_or(&lookup, "EPHEMERA_SWEEP_INTERVAL_SECS", 30)?);
        if sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "EPHEMERA_SWEEP_INTERVAL_SECS",
                value: "0".into(),
            });
        }

        let public_base_url = lookup("EPHEMERA_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", addr.port()));

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            store_timeout,
            sweep_interval,
            public_base_url,
        })
    }
}

fn parse_or<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}
