//! Immutable, versioned snapshots of the IR within a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::delta::IrDelta;
use super::ir::IrDocument;

/// Validator verdict on a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Consistent and complete
    Valid,
    /// At least one diagnostic
    Invalid,
    /// Validator has not produced a verdict yet (e.g. it timed out).
    Pending,
}

impl ValidationStatus {
    /// Wire name of the verdict.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Pending => "pending",
        }
    }

    /// Parse a wire name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "valid" => Some(Self::Valid),
            "invalid" => Some(Self::Invalid),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict returned by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// The verdict
    pub status: ValidationStatus,
    /// Why the draft is not valid
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl ValidationReport {
    /// A clean verdict.
    pub fn valid() -> Self {
        Self {
            status: ValidationStatus::Valid,
            diagnostics: Vec::new(),
        }
    }

    /// A failing verdict with its diagnostics.
    pub fn invalid(diagnostics: Vec<String>) -> Self {
        Self {
            status: ValidationStatus::Invalid,
            diagnostics,
        }
    }

    /// No verdict yet, with the reason.
    pub fn pending(reason: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Pending,
            diagnostics: vec![reason.into()],
        }
    }
}

/// One version of the IR. Never mutated after being appended to a session;
/// the only exception is upgrading a `pending` verdict (see
/// [`crate::domain::models::Session::upgrade_pending_validation`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Draft {
    /// Position in the session's draft chain, starting at 0
    pub version: u32,
    /// The document at this version
    pub ir: IrDocument,
    /// Validator verdict
    pub validation_status: ValidationStatus,
    /// Diagnostics of the verdict
    #[serde(default)]
    pub diagnostics: Vec<String>,
    /// The delta that produced this draft from its predecessor. `None` for v0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<IrDelta>,
    /// When the draft was appended
    pub created_at: DateTime<Utc>,
}

impl Draft {
    /// Draft v0, straight from the translator.
    pub fn initial(ir: IrDocument, report: ValidationReport) -> Self {
        Self {
            version: 0,
            ir,
            validation_status: report.status,
            diagnostics: report.diagnostics,
            delta: None,
            created_at: Utc::now(),
        }
    }

    /// Successor draft produced by `delta`, awaiting validation.
    pub fn successor(prior: &Draft, ir: IrDocument, delta: IrDelta) -> Self {
        Self {
            version: prior.version + 1,
            ir,
            validation_status: ValidationStatus::Pending,
            diagnostics: Vec::new(),
            delta: Some(delta),
            created_at: Utc::now(),
        }
    }

    /// Attach a validator verdict before the draft is published.
    pub fn with_validation(mut self, report: ValidationReport) -> Self {
        self.validation_status = report.status;
        self.diagnostics = report.diagnostics;
        self
    }

    /// Whether the validator accepted this draft.
    pub fn is_valid(&self) -> bool {
        self.validation_status == ValidationStatus::Valid
    }
}
