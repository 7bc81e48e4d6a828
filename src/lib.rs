//! Specforge - specification session engine
//!
//! Turns an ambiguous natural-language request into a structured
//! intermediate representation (IR) through a resumable clarification
//! session: unknowns become typed holes, each user answer produces a new
//! immutable draft, and finalization is gated on zero open holes and a
//! passing validation.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): IR model, drafts, sessions, rules and ports
//! - **Service Layer** (`services`): detector, delta engine, rule registry,
//!   suggestion curator and the session state machine
//! - **Adapters** (`adapters`): SQLite and in-memory repositories,
//!   translators, validators, HTTP API
//! - **Infrastructure Layer** (`infrastructure`): configuration, logging, setup
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{
    Config, Draft, IrDocument, Resolution, ResolutionType, Session, SessionStatus, TypedHole, ValidationStatus,
};
pub use domain::ports::{RuleRegistry, RuleRepository, SessionRepository, Translator, Validator};
pub use domain::{SessionError, SessionResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{AmbiguityDetector, DeltaEngine, InferenceRuleRegistry, SessionService, SuggestionCurator};
