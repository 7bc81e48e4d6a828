//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces the session engine depends on:
//! - Translator: prompt to initial IR
//! - Validator: external certification of a draft
//! - SessionRepository / RuleRepository: persistence
//! - RuleRegistry: rule matching and feedback for the suggestion curator

pub mod rule_registry;
pub mod rule_repository;
pub mod session_repository;
pub mod translator;
pub mod validator;

pub use rule_registry::RuleRegistry;
pub use rule_repository::RuleRepository;
pub use session_repository::SessionRepository;
pub use translator::{Translation, Translator};
pub use validator::Validator;
