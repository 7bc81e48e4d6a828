//! Configuration sections loaded by the config loader.

use serde::{Deserialize, Serialize};

use super::suggestion::DEFAULT_UNKNOWN_CONFIDENCE;

/// Main configuration structure for Specforge
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Session engine timeouts and limits
    #[serde(default)]
    pub session: SessionConfig,

    /// Inference rule registry configuration
    #[serde(default)]
    pub rules: RulesConfig,

    /// Translator collaborator configuration
    #[serde(default)]
    pub translator: TranslatorConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".specforge/specforge.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Console log encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Human-readable, colored
    Pretty,
}

/// How often the log file rolls over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    /// New file every day
    #[default]
    Daily,
    /// New file every hour
    Hourly,
    /// Single file
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation of files under `log_dir`
    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind
    #[serde(default = "default_port")]
    pub port: u16,

    /// Allow cross-origin requests
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    9310
}

const fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: default_true(),
        }
    }
}

/// Timeouts for collaborator calls made by the session engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SessionConfig {
    /// Milliseconds allowed for translating a prompt
    #[serde(default = "default_translator_timeout_ms")]
    pub translator_timeout_ms: u64,

    /// Milliseconds allowed for one validation
    #[serde(default = "default_validator_timeout_ms")]
    pub validator_timeout_ms: u64,

    /// Milliseconds allowed for computing suggestions
    #[serde(default = "default_suggestion_timeout_ms")]
    pub suggestion_timeout_ms: u64,

    /// Upper bound on suggestions returned per hole
    #[serde(default = "default_max_suggestions_per_hole")]
    pub max_suggestions_per_hole: usize,
}

const fn default_translator_timeout_ms() -> u64 {
    30_000
}

const fn default_validator_timeout_ms() -> u64 {
    10_000
}

const fn default_suggestion_timeout_ms() -> u64 {
    2_000
}

const fn default_max_suggestions_per_hole() -> usize {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            translator_timeout_ms: default_translator_timeout_ms(),
            validator_timeout_ms: default_validator_timeout_ms(),
            suggestion_timeout_ms: default_suggestion_timeout_ms(),
            max_suggestions_per_hole: default_max_suggestions_per_hole(),
        }
    }
}

/// Inference rule registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RulesConfig {
    /// Confidence reported for holes no rule matches
    #[serde(default = "default_unknown_confidence")]
    pub unknown_confidence: f64,

    /// Confidence below which a rule starts its pruning window
    #[serde(default = "default_prune_floor")]
    pub prune_floor: f64,

    /// Hours a rule must stay below the floor before it is excluded
    #[serde(default = "default_prune_window_hours")]
    pub prune_window_hours: i64,

    /// Insert the built-in rules on startup when missing
    #[serde(default = "default_true")]
    pub seed_builtin: bool,
}

const fn default_unknown_confidence() -> f64 {
    DEFAULT_UNKNOWN_CONFIDENCE
}

const fn default_prune_floor() -> f64 {
    0.2
}

const fn default_prune_window_hours() -> i64 {
    168
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            unknown_confidence: default_unknown_confidence(),
            prune_floor: default_prune_floor(),
            prune_window_hours: default_prune_window_hours(),
            seed_builtin: default_true(),
        }
    }
}

/// Which translator collaborator to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    /// Local deterministic translator
    #[default]
    Heuristic,
    /// Remote translator reached over HTTP
    Http,
}

/// Translator collaborator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TranslatorConfig {
    /// Translator implementation
    #[serde(default)]
    pub kind: TranslatorKind,

    /// Endpoint receiving `POST {"prompt": ..}` (http kind only)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout of the HTTP client
    #[serde(default = "default_translator_timeout_ms")]
    pub timeout_ms: u64,

    /// Bearer token sent to the endpoint
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            kind: TranslatorKind::default(),
            endpoint: None,
            timeout_ms: default_translator_timeout_ms(),
            api_key: None,
        }
    }
}
