//! Hierarchical configuration loading and validation.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{Config, TranslatorKind};

/// Project-local configuration directory.
pub const CONFIG_DIR: &str = ".specforge";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `logging.level` is not a tracing level
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// `database.path` is blank
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    /// `database.max_connections` is zero
    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    /// A timeout setting is zero
    #[error("Invalid {0}: must be greater than 0")]
    ZeroTimeout(&'static str),

    /// `session.max_suggestions_per_hole` is zero
    #[error("Invalid max_suggestions_per_hole: must be at least 1")]
    ZeroSuggestions,

    /// `rules.unknown_confidence` is outside (0, 0.5)
    #[error("Invalid unknown_confidence: {0}. Must be in (0, 0.5)")]
    InvalidUnknownConfidence(f64),

    /// `rules.prune_floor` is outside (0, 1)
    #[error("Invalid prune_floor: {0}. Must be in (0, 1)")]
    InvalidPruneFloor(f64),

    /// `rules.prune_window_hours` is negative
    #[error("Invalid prune_window_hours: {0}. Cannot be negative")]
    InvalidPruneWindow(i64),

    /// The http translator has no endpoint
    #[error("translator.endpoint is required when translator.kind is http")]
    MissingTranslatorEndpoint,

    /// Figment could not merge or extract the sources
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .specforge/config.yaml (project config, created by init)
    /// 3. .specforge/local.yaml (project local overrides, optional)
    /// 4. Environment variables (SPECFORGE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(format!("{CONFIG_DIR}/config.yaml")))
            .merge(Yaml::file(format!("{CONFIG_DIR}/local.yaml")))
            .merge(Self::env())
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file. Environment variables still
    /// take precedence over the file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Self::env())
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed("SPECFORGE_").split("__")
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let session = &config.session;
        for (name, value) in [
            ("translator_timeout_ms", session.translator_timeout_ms),
            ("validator_timeout_ms", session.validator_timeout_ms),
            ("suggestion_timeout_ms", session.suggestion_timeout_ms),
            ("translator.timeout_ms", config.translator.timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroTimeout(name));
            }
        }
        if session.max_suggestions_per_hole == 0 {
            return Err(ConfigError::ZeroSuggestions);
        }

        let rules = &config.rules;
        if !(rules.unknown_confidence > 0.0 && rules.unknown_confidence < 0.5) {
            return Err(ConfigError::InvalidUnknownConfidence(rules.unknown_confidence));
        }
        if !(rules.prune_floor > 0.0 && rules.prune_floor < 1.0) {
            return Err(ConfigError::InvalidPruneFloor(rules.prune_floor));
        }
        if rules.prune_window_hours < 0 {
            return Err(ConfigError::InvalidPruneWindow(rules.prune_window_hours));
        }

        if config.translator.kind == TranslatorKind::Http {
            match config.translator.endpoint.as_deref() {
                None => return Err(ConfigError::MissingTranslatorEndpoint),
                Some(endpoint) if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") => {
                    return Err(ConfigError::ValidationFailed(format!(
                        "translator.endpoint must be an http(s) URL, got '{endpoint}'"
                    )));
                }
                Some(_) => {}
            }
        }

        if config.server.host.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("server.host cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::LogFormat;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".specforge/specforge.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.port, 9310);
        assert_eq!(config.translator.kind, TranslatorKind::Heuristic);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
database:
  path: /custom/path.db
  max_connections: 3
logging:
  level: debug
  format: pretty
session:
  suggestion_timeout_ms: 500
rules:
  prune_floor: 0.3
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.session.suggestion_timeout_ms, 500);
        assert_eq!(config.session.validator_timeout_ms, 10_000);
        assert!((config.rules.prune_floor - 0.3).abs() < f64::EPSILON);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_empty_database_path() {
        let mut config = Config::default();
        config.database.path = String::new();
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::EmptyDatabasePath)));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.session.validator_timeout_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ZeroTimeout("validator_timeout_ms"))
        ));
    }

    #[test]
    fn test_validate_confidence_bounds() {
        let mut config = Config::default();
        config.rules.unknown_confidence = 0.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidUnknownConfidence(_))
        ));

        let mut config = Config::default();
        config.rules.prune_floor = 1.0;
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::InvalidPruneFloor(_))));
    }

    #[test]
    fn test_validate_http_translator_needs_endpoint() {
        let mut config = Config::default();
        config.translator.kind = TranslatorKind::Http;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::MissingTranslatorEndpoint)
        ));

        config.translator.endpoint = Some("localhost:8080".into());
        assert!(matches!(ConfigLoader::validate(&config), Err(ConfigError::ValidationFailed(_))));

        config.translator.endpoint = Some("http://localhost:8080/translate".into());
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_env_override() {
        let file = yaml_file("logging:\n  level: info\nserver:\n  port: 8000\n");

        let config = temp_env::with_vars(
            [
                ("SPECFORGE_LOGGING__LEVEL", Some("debug")),
                ("SPECFORGE_SESSION__SUGGESTION_TIMEOUT_MS", Some("750")),
            ],
            || ConfigLoader::load_from_file(file.path()),
        )
        .unwrap();

        assert_eq!(config.logging.level, "debug", "Environment should win over file");
        assert_eq!(config.session.suggestion_timeout_ms, 750);
        assert_eq!(config.server.port, 8000, "File value should persist when not overridden");
    }

    #[test]
    fn test_load_from_file_rejects_invalid_values() {
        let file = yaml_file("rules:\n  prune_floor: 2.0\n");
        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("prune_floor"));
    }

    #[test]
    fn test_hierarchical_merging() {
        let base = yaml_file("logging:\n  level: info\n  format: json\nserver:\n  port: 9000\n");
        let local = yaml_file("logging:\n  level: debug\n");

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(base.path()))
            .merge(Yaml::file(local.path()))
            .extract()
            .unwrap();

        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.port, 9000, "Base value should persist when not overridden");
    }
}
