//! Specforge setup and wiring
//!
//! Handles project initialization (config directory, default config file,
//! database migrations) and assembles the session engine from a loaded
//! [`Config`].

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::adapters::memory::{InMemoryRuleRepository, InMemorySessionRepository};
use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteRuleRepository, SqliteSessionRepository};
use crate::adapters::translators::{HeuristicTranslator, HttpTranslator};
use crate::adapters::validators::ConsistencyValidator;
use crate::domain::models::config::{Config, TranslatorConfig, TranslatorKind};
use crate::domain::ports::{RuleRegistry, RuleRepository, SessionRepository, Translator};
use crate::infrastructure::config::CONFIG_DIR;
use crate::services::{InferenceRuleRegistry, RuleRegistryConfig, SessionService, SessionServiceConfig, SuggestionCurator};

/// Default configuration template content
const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Specforge Configuration
# Override settings by editing this file or setting environment variables
# with SPECFORGE_ prefix
#
# Example environment variables:
#   export SPECFORGE_DATABASE__PATH=/custom/path/specforge.db
#   export SPECFORGE_LOGGING__LEVEL=debug
#   export SPECFORGE_SESSION__SUGGESTION_TIMEOUT_MS=1000

database:
  # Path to SQLite database file (project-local)
  path: ".specforge/specforge.db"
  max_connections: 5

logging:
  # Log level: trace, debug, info, warn, error
  level: "info"
  # Log format: json, pretty
  format: "pretty"
  # Rolling log files are written here when set
  # log_dir: ".specforge/logs"
  rotation: "daily"

server:
  host: "127.0.0.1"
  port: 9310
  enable_cors: true

session:
  translator_timeout_ms: 30000
  validator_timeout_ms: 10000
  suggestion_timeout_ms: 2000
  max_suggestions_per_hole: 5

rules:
  # Confidence reported for holes no rule matches (0 < x < 0.5)
  unknown_confidence: 0.1
  # Rules staying below this confidence for prune_window_hours are excluded
  prune_floor: 0.2
  prune_window_hours: 168
  seed_builtin: true

translator:
  # heuristic (local) or http
  kind: "heuristic"
  # endpoint: "http://localhost:8080/translate"
  timeout_ms: 30000
"#;

/// Setup paths and directories
pub struct SetupPaths {
    /// `.specforge` under the project root
    pub config_dir: PathBuf,
    /// `.specforge/config.yaml`
    pub config_file: PathBuf,
    /// `.specforge/specforge.db`
    pub database_file: PathBuf,
}

impl SetupPaths {
    /// Get setup paths for the current directory
    pub fn new() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to get current directory")?;
        Ok(Self::in_dir(current_dir))
    }

    /// Setup paths rooted at `root`.
    pub fn in_dir(root: impl AsRef<Path>) -> Self {
        let config_dir = root.as_ref().join(CONFIG_DIR);
        Self {
            config_file: config_dir.join("config.yaml"),
            database_file: config_dir.join("specforge.db"),
            config_dir,
        }
    }

    /// Check if Specforge is already initialized
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists() && self.database_file.exists()
    }
}

/// Create the configuration directory
pub fn create_config_dir(paths: &SetupPaths) -> Result<()> {
    fs::create_dir_all(&paths.config_dir).context("Failed to create config directory")
}

/// Create the default configuration file. Returns whether it was written.
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<bool> {
    if paths.config_file.exists() && !force {
        return Ok(false);
    }

    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).context("Failed to write config file")?;
    Ok(true)
}

/// Create the database and apply pending migrations.
pub async fn run_migrations(paths: &SetupPaths) -> Result<()> {
    let url = database_url(&paths.database_file.to_string_lossy());
    let pool = initialize_database(&url, None)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;
    Ok(())
}

/// The assembled session engine.
pub struct Engine {
    /// The session service
    pub service: Arc<SessionService>,
    /// The rule registry behind the service's curator
    pub registry: Arc<InferenceRuleRegistry>,
}

impl Engine {
    /// The registry as the port the HTTP surface consumes.
    pub fn rule_registry(&self) -> Arc<dyn RuleRegistry> {
        self.registry.clone()
    }
}

/// Build the translator collaborator selected by `config.kind`.
pub fn build_translator(config: &TranslatorConfig) -> Result<Arc<dyn Translator>> {
    match config.kind {
        TranslatorKind::Heuristic => Ok(Arc::new(HeuristicTranslator::new())),
        TranslatorKind::Http => {
            let translator = HttpTranslator::from_config(config).context("Failed to configure HTTP translator")?;
            Ok(Arc::new(translator))
        }
    }
}

/// Wire repositories, the rule registry, collaborators and the session
/// service. With `ephemeral`, everything lives in process memory.
pub async fn build_engine(config: &Config, ephemeral: bool) -> Result<Engine> {
    let (sessions, rules): (Arc<dyn SessionRepository>, Arc<dyn RuleRepository>) = if ephemeral {
        (
            Arc::new(InMemorySessionRepository::new()),
            Arc::new(InMemoryRuleRepository::new()),
        )
    } else {
        let url = database_url(&config.database.path);
        let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;
        (
            Arc::new(SqliteSessionRepository::new(pool.clone())),
            Arc::new(SqliteRuleRepository::new(pool)),
        )
    };

    let registry = Arc::new(InferenceRuleRegistry::new(RuleRegistryConfig::from(&config.rules)).with_repo(rules));
    let loaded = registry.load_from_repo().await;
    let seeded = if config.rules.seed_builtin {
        registry.seed_builtin().await
    } else {
        0
    };

    let curator = Arc::new(SuggestionCurator::new(
        registry.clone(),
        config.rules.unknown_confidence,
        config.session.max_suggestions_per_hole,
    ));
    let translator = build_translator(&config.translator)?;

    info!(
        ephemeral,
        translator = translator.name(),
        rules_loaded = loaded,
        rules_seeded = seeded,
        "session engine ready"
    );

    let service = SessionService::new(
        sessions,
        translator,
        Arc::new(ConsistencyValidator::new()),
        curator,
        SessionServiceConfig::from(&config.session),
    );

    Ok(Engine {
        service: Arc::new(service),
        registry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::ConfigLoader;

    #[test]
    fn test_default_template_is_valid_config() {
        let config: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        ConfigLoader::validate(&config).unwrap();
        assert_eq!(config.server.port, 9310);
    }

    #[tokio::test]
    async fn test_init_creates_config_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SetupPaths::in_dir(dir.path());
        assert!(!paths.is_initialized());

        create_config_dir(&paths).unwrap();
        assert!(create_config_file(&paths, false).unwrap());
        assert!(!create_config_file(&paths, false).unwrap());
        run_migrations(&paths).await.unwrap();

        assert!(paths.is_initialized());
    }

    #[tokio::test]
    async fn test_ephemeral_engine_seeds_rules_and_opens_sessions() {
        let engine = build_engine(&Config::default(), true).await.unwrap();
        assert_eq!(
            engine.registry.list().await.len(),
            InferenceRuleRegistry::builtin_rules().len()
        );

        let session = engine.service.create("A function that adds two numbers").await.unwrap();
        assert!(session.open_holes.contains("hole_param_type"));
    }

    #[tokio::test]
    async fn test_sqlite_engine_persists_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("specforge.db").to_string_lossy().into_owned();

        let id = {
            let engine = build_engine(&config, false).await.unwrap();
            engine.service.create("Reverse a string").await.unwrap().id
        };

        let engine = build_engine(&config, false).await.unwrap();
        let session = engine.service.get(id).await.unwrap();
        assert_eq!(session.prompt, "Reverse a string");
    }
}
