//! Common test utilities for integration tests
//!
//! Shared fixtures for building engines over in-memory or SQLite storage.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

use specforge::adapters::memory::InMemorySessionRepository;
use specforge::adapters::translators::HeuristicTranslator;
use specforge::adapters::validators::ConsistencyValidator;
use specforge::domain::errors::{DomainError, DomainResult};
use specforge::domain::models::{
    Config, HoleContext, InferenceRule, IrDocument, Resolution, ResolutionType, RuleCandidate, ValidationReport,
};
use specforge::domain::ports::{RuleRegistry, Translator, Validator};
use specforge::infrastructure::setup::{build_engine, Engine};
use specforge::services::{
    InferenceRuleRegistry, RuleRegistryConfig, SessionService, SessionServiceConfig, SuggestionCurator,
};

pub const ADDER_PROMPT: &str = "A function that adds two numbers";

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Config pointing at a fresh SQLite file under `dir`.
pub fn sqlite_config(dir: &TempDir) -> (Config, PathBuf) {
    let db_path = dir.path().join("specforge.db");
    let mut config = Config::default();
    config.database.path = db_path.to_string_lossy().into_owned();
    (config, db_path)
}

/// Engine with in-memory repositories and the built-in rules.
pub async fn ephemeral_engine() -> Engine {
    build_engine(&Config::default(), true)
        .await
        .expect("Failed to build ephemeral engine")
}

/// Engine backed by `config.database.path`.
pub async fn sqlite_engine(config: &Config) -> Engine {
    build_engine(config, false).await.expect("Failed to build SQLite engine")
}

pub fn specify_type(text: &str) -> Resolution {
    Resolution::new(ResolutionType::SpecifyType, text)
}

/// Setup test logging
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Validator that fails its first `failures` calls, then defers to
/// [`ConsistencyValidator`].
pub struct FlakyValidator {
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyValidator {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Validator for FlakyValidator {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn validate(&self, ir: &IrDocument) -> DomainResult<ValidationReport> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DomainError::DatabaseError("validator backend unavailable".to_string()));
        }
        ConsistencyValidator::new().validate(ir).await
    }
}

/// Built-in rules behind a gate: once armed, the next `match_context` call
/// announces itself and then waits until [`GatedRegistry::open`].
pub struct GatedRegistry {
    inner: InferenceRuleRegistry,
    armed: AtomicBool,
    entered: Notify,
    gate: Notify,
    calls: AtomicUsize,
}

impl GatedRegistry {
    pub fn new() -> Self {
        Self {
            inner: InferenceRuleRegistry::with_builtin_rules(RuleRegistryConfig::default()),
            armed: AtomicBool::new(false),
            entered: Notify::new(),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Hold the next lookup at the gate.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until an armed lookup is parked at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn open(&self) {
        self.gate.notify_waiters();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleRegistry for GatedRegistry {
    async fn match_context(&self, ctx: &HoleContext) -> Vec<RuleCandidate> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.armed.swap(false, Ordering::SeqCst) {
            let opened = self.gate.notified();
            self.entered.notify_one();
            opened.await;
        }
        self.inner.match_context(ctx).await
    }

    async fn record_feedback(&self, rule_id: &str, helpful: bool) -> DomainResult<InferenceRule> {
        self.inner.record_feedback(rule_id, helpful).await
    }

    async fn list(&self) -> Vec<InferenceRule> {
        self.inner.list().await
    }
}

/// Session service over in-memory storage with the given collaborators.
pub fn service_with(translator: Arc<dyn Translator>, validator: Arc<dyn Validator>) -> SessionService {
    let registry = Arc::new(InferenceRuleRegistry::with_builtin_rules(RuleRegistryConfig::default()));
    service_with_registry(translator, validator, registry)
}

/// Like [`service_with`], consulting `registry` for suggestions.
pub fn service_with_registry(
    translator: Arc<dyn Translator>,
    validator: Arc<dyn Validator>,
    registry: Arc<dyn RuleRegistry>,
) -> SessionService {
    let curator = Arc::new(SuggestionCurator::new(registry, 0.1, 5));
    SessionService::new(
        Arc::new(InMemorySessionRepository::new()),
        translator,
        validator,
        curator,
        SessionServiceConfig::default(),
    )
}

pub fn heuristic() -> Arc<dyn Translator> {
    Arc::new(HeuristicTranslator::new())
}
