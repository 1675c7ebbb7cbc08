//! Configuration types for tollgate
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use crate::util::SecretString;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Permission and role storage
    pub database: DatabaseConfig,

    /// Permission sync settings
    pub sync: SyncConfig,

    /// Role slug → wildcard patterns granted to it when new permissions appear.
    /// Rules run in the order written.
    pub auto_assign: IndexMap<String, Vec<String>>,

    /// Roles created at startup if absent
    pub seed: SeedConfig,

    /// Bearer tokens accepted by the admin API
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Whether a sync pass should run before the server starts
    pub fn should_auto_sync_on_startup(&self) -> bool {
        self.sync.should_auto_sync_on_startup(self.server.environment)
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP host
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Deployment environment
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: Environment::Development,
        }
    }
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// SQLite database holding permissions, roles and their association
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL, e.g. `sqlite://tollgate.db` or `sqlite::memory:`
    pub url: String,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// Busy timeout in milliseconds
    pub busy_timeout_ms: u64,

    /// Apply embedded migrations on startup
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://tollgate.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5000,
            run_migrations: true,
        }
    }
}

impl DatabaseConfig {
    /// In-memory databases live in a single connection
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Permission sync configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Run a sync pass at startup. Unset means "everywhere but production".
    pub auto_sync: Option<bool>,
}

impl SyncConfig {
    pub fn should_auto_sync_on_startup(&self, environment: Environment) -> bool {
        self.auto_sync
            .unwrap_or(environment != Environment::Production)
    }
}

/// Startup seed data
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Role slug → role settings
    pub roles: IndexMap<String, SeedRole>,
}

/// A role to create at startup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedRole {
    pub description: Option<String>,
}

/// Admin API authentication
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Accepted bearer tokens
    pub tokens: Vec<TokenConfig>,

    /// Role given to token holders configured without any role
    pub default_role: Option<String>,
}

/// One bearer token and the user it authenticates
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub token: SecretString,
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.environment, Environment::Development);
        assert!(config.auto_assign.is_empty());
        assert!(config.auth.tokens.is_empty());
        assert_eq!(config.database.url, "sqlite://tollgate.db");
        assert!(config.database.run_migrations);
    }

    #[test]
    fn test_in_memory_database() {
        let memory = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        assert!(memory.is_in_memory());
        assert!(!DatabaseConfig::default().is_in_memory());
    }

    #[test]
    fn test_auto_sync_defaults_by_environment() {
        let sync = SyncConfig::default();
        assert!(sync.should_auto_sync_on_startup(Environment::Development));
        assert!(!sync.should_auto_sync_on_startup(Environment::Production));

        let forced = SyncConfig {
            auto_sync: Some(true),
        };
        assert!(forced.should_auto_sync_on_startup(Environment::Production));

        let disabled = SyncConfig {
            auto_sync: Some(false),
        };
        assert!(!disabled.should_auto_sync_on_startup(Environment::Development));
    }

    #[test]
    fn test_deserialize_environment() {
        let env: Environment = serde_json::from_str(r#""production""#).unwrap();
        assert_eq!(env, Environment::Production);
        assert!(serde_json::from_str::<Environment>(r#""staging""#).is_err());
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token: TokenConfig = serde_json::from_str(
            r#"{"token": "s3cret", "user_id": "1", "username": "root", "roles": ["admin"]}"#,
        )
        .unwrap();
        assert!(!format!("{:?}", token).contains("s3cret"));
    }
}
