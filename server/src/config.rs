//! Configuration management for the Barangay Desk server

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::crypto;

pub const DEFAULT_ADMIN_PASSWORD: &str = "CHANGE-THIS-PASSWORD-IMMEDIATELY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_path: String,
    pub cleanup_interval_minutes: u64,
}

/// The single staff account. Staff sign in with either the username or the
/// email; the email is the identity the session is issued to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    pub username: String,
    pub email: String,
    /// Hex SHA-256 of the password. Generate with `hash-password`.
    pub password_hash: String,
    pub session_ttl_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_message_length: usize,
    pub max_body_kb: usize,
}

impl Config {
    pub async fn load(path: &str) -> anyhow::Result<Self> {
        if Path::new(path).exists() {
            let content = fs::read_to_string(path).await?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = Config::default();
            let content = toml::to_string_pretty(&config)?;
            fs::write(path, content).await?;
            tracing::info!("Created default config at {}", path);
            Ok(config)
        }
    }

    pub fn uses_default_password(&self) -> bool {
        crypto::verify_secret(DEFAULT_ADMIN_PASSWORD, &self.admin.password_hash)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 9443,
            },
            storage: StorageConfig {
                database_path: "./data/barangay.db".to_string(),
                cleanup_interval_minutes: 60,
            },
            admin: AdminConfig {
                username: "admin".to_string(),
                email: "admin@barangay.local".to_string(),
                password_hash: crypto::hash_secret(DEFAULT_ADMIN_PASSWORD),
                session_ttl_hours: 12,
            },
            limits: LimitsConfig {
                max_message_length: 2000,
                max_body_kb: 512,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let config = Config::default();
        assert!(config.uses_default_password());

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.admin.username, "admin");
        assert_eq!(parsed.limits.max_message_length, 2000);
    }
}
