use anyhow::{bail, Context};
use pitchlink_database::DatabaseConfig;
use pitchlink_referral::DEFAULT_MAX_CODE_ATTEMPTS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => bail!("Unknown STORAGE_BACKEND: {}", other),
        }
    }
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Postgres => f.write_str("postgres"),
            StorageBackend::Memory => f.write_str("memory"),
        }
    }
}

/// Outbound webhook for join-request notifications; events are only logged when unset
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub base_url: String,
    pub storage: StorageBackend,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub notifications: NotificationConfig,
    pub referral_code_max_attempts: usize,
    /// Player records loaded into the memory backend at startup
    pub memory_seed_file: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let storage = std::env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let webhook_url = non_empty_var("NOTIFICATION_WEBHOOK_URL");
        let webhook_secret = non_empty_var("NOTIFICATION_WEBHOOK_SECRET");
        if webhook_url.is_some() && webhook_secret.is_none() {
            bail!("NOTIFICATION_WEBHOOK_SECRET must be set when NOTIFICATION_WEBHOOK_URL is");
        }

        Ok(Self {
            server_host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            storage,
            database: DatabaseConfig::from_env(),
            jwt_secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            notifications: NotificationConfig {
                webhook_url,
                webhook_secret,
            },
            referral_code_max_attempts: std::env::var("REFERRAL_CODE_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_MAX_CODE_ATTEMPTS),
            memory_seed_file: non_empty_var("MEMORY_SEED_FILE"),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
