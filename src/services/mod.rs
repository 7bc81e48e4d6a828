//! Service layer for the Specforge session engine.
//!
//! Business logic sits here, behind the domain ports:
//! - AmbiguityDetector: scans drafts for typed holes
//! - DeltaEngine: computes and applies IR deltas
//! - InferenceRuleRegistry: rule population with feedback-driven confidence
//! - SuggestionCurator: ranked resolutions per hole
//! - SessionService: the session state machine

pub mod ambiguity_detector;
pub mod delta_engine;
pub mod rule_registry;
pub mod session_service;
pub mod suggestion_curator;

pub use ambiguity_detector::AmbiguityDetector;
pub use delta_engine::DeltaEngine;
pub use rule_registry::{InferenceRuleRegistry, RuleRegistryConfig};
pub use session_service::{SessionService, SessionServiceConfig};
pub use suggestion_curator::{FeedbackOutcome, SuggestionCurator};
