//! Domain models: the IR, drafts, deltas, sessions, rules and configuration.

pub mod config;
pub mod delta;
pub mod draft;
pub mod inference_rule;
pub mod ir;
pub mod resolution;
pub mod session;
pub mod suggestion;

pub use config::{
    Config, DatabaseConfig, LogFormat, LoggingConfig, RotationPolicy, RulesConfig, ServerConfig,
    SessionConfig, TranslatorConfig, TranslatorKind,
};
pub use delta::{Entity, IrDelta, Patch, Producer};
pub use draft::{Draft, ValidationReport, ValidationStatus};
pub use inference_rule::{InferenceRule, RulePattern};
pub use ir::{
    Assertion, Clause, Effect, FieldKind, FieldRef, HoleKind, HoleStatus, Intent, IrDocument,
    Parameter, Severity, Signature, Slot, TypedHole, INTENT_ID, SIGNATURE_ID,
};
pub use resolution::{Resolution, ResolutionType};
pub use session::{HistoryEntry, Session, SessionStatus};
pub use suggestion::{
    AssistSuggestion, HoleContext, RuleCandidate, Suggestion, DEFAULT_UNKNOWN_CONFIDENCE,
};
