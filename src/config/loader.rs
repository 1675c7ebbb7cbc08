//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Conventional variables (`PERMISSIONS_AUTO_SYNC`, `APP_ENV`)
//! 2. Environment variables (TOLLGATE_*)
//! 3. Configuration file (TOML)
//! 4. Default values

use crate::access_control::{is_valid_permission_slug, normalize_role_slug};
use crate::config::types::AppConfig;
use crate::error::ConfigError;
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use std::collections::HashSet;
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "tollgate.toml",
    ".tollgate.toml",
    "~/.config/tollgate/config.toml",
    "/etc/tollgate/config.toml",
];

/// Role slugs must be this long after normalization
pub const ROLE_SLUG_MIN_LEN: usize = 3;
pub const ROLE_SLUG_MAX_LEN: usize = 50;

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder().add_source(File::from_str(toml_str, FileFormat::Toml));
    build_and_validate(builder)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. Start with defaults (handled by serde defaults on AppConfig)

    // 2. Add configuration file
    if let Some(path) = config_path {
        let expanded = shellexpand::tilde(path);
        // Explicit path provided - must exist
        if !Path::new(expanded.as_ref()).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // 3. Add environment variables with TOLLGATE_ prefix
    // e.g., TOLLGATE_SERVER__PORT, TOLLGATE_SYNC__AUTO_SYNC
    // Double underscore (__) maps to nested keys (server.port)
    builder = builder.add_source(
        Environment::with_prefix("TOLLGATE")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. Conventional deployment variables
    if let Ok(value) = std::env::var("PERMISSIONS_AUTO_SYNC") {
        let enabled = parse_flag(&value).ok_or_else(|| ConfigError::Invalid {
            message: format!(
                "PERMISSIONS_AUTO_SYNC must be 'true' or 'false', got: {}",
                value
            ),
        })?;
        builder = builder
            .set_override("sync.auto_sync", enabled)
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    if let Ok(environment) = std::env::var("APP_ENV") {
        builder = builder
            .set_override("server.environment", environment.to_lowercase())
            .map_err(|e| ConfigError::Load(e.to_string()))?;
    }

    build_and_validate(builder)
}

fn build_and_validate(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.host.is_empty() {
        return Err(ConfigError::Missing {
            field: "server.host".to_string(),
        });
    }

    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    validate_database(config)?;

    for (role, patterns) in &config.auto_assign {
        validate_role_slug(role, &format!("auto_assign.{}", role))?;
        validate_patterns(patterns, &format!("auto_assign.{}", role))?;
    }

    for role in config.seed.roles.keys() {
        validate_role_slug(role, &format!("seed.roles.{}", role))?;
    }

    validate_tokens(config)?;

    Ok(())
}

/// Role slugs in configuration must already be in normalized form
fn validate_role_slug(slug: &str, field_path: &str) -> Result<(), ConfigError> {
    if normalize_role_slug(slug) != slug {
        return Err(ConfigError::Invalid {
            message: format!(
                "{}: role slug must be lowercase kebab-case, got: {}",
                field_path, slug
            ),
        });
    }

    if !(ROLE_SLUG_MIN_LEN..=ROLE_SLUG_MAX_LEN).contains(&slug.len()) {
        return Err(ConfigError::Invalid {
            message: format!(
                "{}: role slug must be {}-{} characters long",
                field_path, ROLE_SLUG_MIN_LEN, ROLE_SLUG_MAX_LEN
            ),
        });
    }

    Ok(())
}

/// Validate that all patterns are well-formed permission patterns
fn validate_patterns(patterns: &[String], field_path: &str) -> Result<(), ConfigError> {
    for pattern in patterns {
        if !is_valid_permission_slug(pattern) {
            return Err(ConfigError::InvalidPattern {
                pattern: pattern.clone(),
                reason: format!("in {}: expected '*' or 'resource.action'", field_path),
            });
        }
    }
    Ok(())
}

fn validate_database(config: &AppConfig) -> Result<(), ConfigError> {
    let database = &config.database;

    if database.url.is_empty() {
        return Err(ConfigError::Missing {
            field: "database.url".to_string(),
        });
    }

    if !database.url.starts_with("sqlite:") {
        return Err(ConfigError::Invalid {
            message: format!(
                "database.url must be a sqlite: URL, got: {}",
                database.url
            ),
        });
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Invalid {
            message: "database.max_connections must be greater than 0".to_string(),
        });
    }

    Ok(())
}

fn validate_tokens(config: &AppConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for (index, entry) in config.auth.tokens.iter().enumerate() {
        if entry.token.is_empty() {
            return Err(ConfigError::Missing {
                field: format!("auth.tokens[{}].token", index),
            });
        }
        if !seen.insert(entry.token.expose_secret()) {
            return Err(ConfigError::Invalid {
                message: format!("auth.tokens[{}] duplicates an earlier token", index),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment as DeployEnvironment;

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
[server]
host = "0.0.0.0"
port = 8080
environment = "production"

[sync]
auto_sync = true
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.environment, DeployEnvironment::Production);
        assert!(config.should_auto_sync_on_startup());
    }

    #[test]
    fn test_auto_assign_keeps_file_order() {
        let toml = r#"
[auto_assign]
viewer = ["*.read"]
admin = ["*"]
editor = ["posts.*", "comments.*"]
"#;

        let config = load_config_from_str(toml).unwrap();
        let roles: Vec<_> = config.auto_assign.keys().cloned().collect();
        assert_eq!(roles, vec!["viewer", "admin", "editor"]);
        assert_eq!(config.auto_assign["editor"], vec!["posts.*", "comments.*"]);
    }

    #[test]
    fn test_invalid_auto_assign_pattern() {
        let toml = r#"
[auto_assign]
admin = ["users.read.all"]
"#;

        assert!(matches!(
            load_config_from_str(toml).unwrap_err(),
            ConfigError::InvalidPattern { .. }
        ));
    }

    #[test]
    fn test_unnormalized_role_slug() {
        let toml = r#"
[auto_assign]
"Content Editor" = ["posts.*"]
"#;

        assert!(matches!(
            load_config_from_str(toml).unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn test_seed_role_too_short() {
        let toml = r#"
[seed.roles.ab]
description = "too short"
"#;

        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn test_duplicate_tokens() {
        let toml = r#"
[[auth.tokens]]
token = "same"
user_id = "1"
username = "a"

[[auth.tokens]]
token = "same"
user_id = "2"
username = "b"
"#;

        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn test_zero_port() {
        let toml = r#"
[server]
port = 0
"#;

        assert!(load_config_from_str(toml).is_err());
    }

    #[test]
    fn test_database_url() {
        let config = load_config_from_str("[database]\nurl = \"sqlite:///var/lib/tollgate.db\"\n").unwrap();
        assert_eq!(config.database.url, "sqlite:///var/lib/tollgate.db");
        assert_eq!(config.database.max_connections, 5);

        let postgres = "[database]\nurl = \"postgres://localhost/tollgate\"\n";
        assert!(matches!(
            load_config_from_str(postgres).unwrap_err(),
            ConfigError::Invalid { .. }
        ));
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" FALSE "), Some(false));
        assert_eq!(parse_flag("yes"), None);
    }
}
