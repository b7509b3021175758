use anyhow::{anyhow, Context, Result};
use dotenvy::dotenv;
use secrecy::Secret;
use std::env;
use std::time::Duration;

use crate::fiscal::{RetryPolicy, SuccessRule};

#[derive(Clone, Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub authority: AuthorityConfig,
    pub auth: AuthConfig,
    pub service_name: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Which authority implementation the service talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthorityMode {
    /// HTTP calls against the configured endpoint.
    Live,
    /// Canned in-process replies, for sandbox runs without an endpoint.
    Mock,
}

#[derive(Clone, Debug)]
pub struct AuthorityConfig {
    pub mode: AuthorityMode,
    pub endpoint: String,
    /// Required by private mock endpoints, absent for the live authority.
    pub api_key: Option<Secret<String>>,
    pub tpin: String,
    pub bhf_id: String,
    pub device_serial: String,
    pub success_rule: SuccessRule,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl AuthorityConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
            backoff_multiplier: 2.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let host = env::var("POS_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("POS_SERVICE_PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse()?;

        let db_url = env::var("POS_DATABASE_URL").context("POS_DATABASE_URL must be set")?;
        let max_connections = env::var("POS_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()?;
        let min_connections = env::var("POS_DB_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let mode_raw = env::var("TAX_AUTHORITY_MODE").unwrap_or_else(|_| "live".to_string());
        let mode = match mode_raw.as_str() {
            "live" => AuthorityMode::Live,
            "mock" => AuthorityMode::Mock,
            other => return Err(anyhow!("Unknown TAX_AUTHORITY_MODE '{}'", other)),
        };
        let endpoint = match mode {
            AuthorityMode::Live => env::var("TAX_API_URL").context("TAX_API_URL must be set")?,
            AuthorityMode::Mock => env::var("TAX_API_URL").unwrap_or_default(),
        };
        let api_key = env::var("TAX_API_KEY").ok().map(Secret::new);
        let tpin = env::var("TAX_TPIN").unwrap_or_else(|_| "1000000000".to_string());
        let bhf_id = env::var("TAX_BHF_ID").unwrap_or_else(|_| "000".to_string());
        let device_serial =
            env::var("TAX_DEVICE_SERIAL").unwrap_or_else(|_| "POS-DEV-001".to_string());

        let success_rule_raw =
            env::var("TAX_SUCCESS_RULE").unwrap_or_else(|_| "body-result-code".to_string());
        let success_rule = SuccessRule::parse(&success_rule_raw)
            .ok_or_else(|| anyhow!("Unknown TAX_SUCCESS_RULE '{}'", success_rule_raw))?;

        let request_timeout = Duration::from_secs(
            env::var("TAX_REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        );
        let max_attempts = env::var("TAX_MAX_ATTEMPTS")
            .unwrap_or_else(|_| "3".to_string())
            .parse()?;
        let initial_backoff = Duration::from_millis(
            env::var("TAX_BACKOFF_BASE_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
        );
        let max_backoff = Duration::from_millis(
            env::var("TAX_BACKOFF_MAX_MS")
                .unwrap_or_else(|_| "30000".to_string())
                .parse()?,
        );

        let jwt_secret = env::var("POS_JWT_SECRET").unwrap_or_else(|_| "dev-secret".to_string());

        Ok(Self {
            server: ServerConfig { host, port },
            database: DatabaseConfig {
                url: Secret::new(db_url),
                max_connections,
                min_connections,
            },
            authority: AuthorityConfig {
                mode,
                endpoint,
                api_key,
                tpin,
                bhf_id,
                device_serial,
                success_rule,
                request_timeout,
                max_attempts,
                initial_backoff,
                max_backoff,
            },
            auth: AuthConfig {
                jwt_secret: Secret::new(jwt_secret),
            },
            service_name: "pos-service".to_string(),
        })
    }
}
