// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration (spec.md §6): loaded from an optional TOML file,
//! then overridden by `OJ_`-prefixed environment variables. Every field
//! has a sane default so a bare `DaemonConfig::default()` is a valid (if
//! minimal) configuration.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "oddjobs".to_string(),
            user: "oddjobs".to_string(),
            password: String::new(),
            ssl_mode: "prefer".to_string(),
            max_connections: 10,
        }
    }
}

impl StoreConfig {
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub exchange: String,
    pub publisher_confirms: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: "guest".to_string(),
            exchange: "oddjobs.events".to_string(),
            publisher_confirms: true,
        }
    }
}

impl BrokerConfig {
    pub fn amqp_uri(&self) -> String {
        format!("amqp://{}:{}@{}:{}/%2f", self.user, self.password, self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfigOpt {
    pub auth_token: Option<String>,
    pub hmac_secret: Option<String>,
    pub rate_limit_per_minute: u32,
    pub rate_limit_burst: u32,
}

impl Default for SecurityConfigOpt {
    fn default() -> Self {
        Self {
            auth_token: None,
            hmac_secret: None,
            rate_limit_per_minute: 300,
            rate_limit_burst: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub api_port: u16,
    pub heartbeat_interval_seconds: u64,
    pub reconcile_interval_seconds: u64,
    pub outbox_poll_interval_seconds: u64,
    pub outbox_batch_size: i64,
    pub shutdown_grace_seconds: u64,
    pub runner_command: String,
    pub runner_cwd: std::path::PathBuf,
    pub store: StoreConfig,
    pub broker: BrokerConfig,
    pub security: SecurityConfigOpt,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            api_port: 4170,
            heartbeat_interval_seconds: 10,
            reconcile_interval_seconds: 15,
            outbox_poll_interval_seconds: 2,
            outbox_batch_size: 100,
            shutdown_grace_seconds: 10,
            runner_command: "oj-runner".to_string(),
            runner_cwd: std::path::PathBuf::from("."),
            store: StoreConfig::default(),
            broker: BrokerConfig::default(),
            security: SecurityConfigOpt::default(),
        }
    }
}

impl DaemonConfig {
    /// Loads `path` if it exists, then applies `OJ_`-prefixed environment
    /// overrides (e.g. `OJ_API_PORT`, `OJ_STORE_HOST`). Mirrors the
    /// teacher's "file then env, env wins" layering without the file
    /// being required for a dev deployment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("OJ_API_PORT") {
            if let Ok(v) = v.parse() {
                self.api_port = v;
            }
        }
        if let Ok(v) = std::env::var("OJ_STORE_HOST") {
            self.store.host = v;
        }
        if let Ok(v) = std::env::var("OJ_STORE_PORT") {
            if let Ok(v) = v.parse() {
                self.store.port = v;
            }
        }
        if let Ok(v) = std::env::var("OJ_STORE_DATABASE") {
            self.store.database = v;
        }
        if let Ok(v) = std::env::var("OJ_STORE_USER") {
            self.store.user = v;
        }
        if let Ok(v) = std::env::var("OJ_STORE_PASSWORD") {
            self.store.password = v;
        }
        if let Ok(v) = std::env::var("OJ_BROKER_ENABLED") {
            self.broker.enabled = v == "1" || v.eq_ignore_ascii_case("true");
        }
        if let Ok(v) = std::env::var("OJ_BROKER_HOST") {
            self.broker.host = v;
        }
        if let Ok(v) = std::env::var("OJ_AUTH_TOKEN") {
            self.security.auth_token = if v.is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("OJ_HMAC_SECRET") {
            self.security.hmac_secret = if v.is_empty() { None } else { Some(v) };
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
