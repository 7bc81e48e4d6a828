//! Domain models for specification sessions.
//!
//! A session owns an append-only chain of drafts and the set of holes still
//! open on the latest one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::delta::Producer;
use super::draft::{Draft, ValidationReport, ValidationStatus};

/// Session lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Accepting hole resolutions
    Active,
    /// Terminal: IR certified complete and valid
    Finalized,
    /// Terminal: deleted or cancelled by the user, history kept
    Abandoned,
}

impl SessionStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Finalized => "finalized",
            Self::Abandoned => "abandoned",
        }
    }

    /// Parse a wire name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "finalized" => Some(Self::Finalized),
            "abandoned" => Some(Self::Abandoned),
            _ => None,
        }
    }

    /// Whether the session accepts no further changes.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit line for one draft: which delta produced it and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Draft version
    pub version: u32,
    /// Verdict of the draft
    pub validation_status: ValidationStatus,
    /// Reason of the producing delta; `None` for v0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Who produced the delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub produced_by: Option<Producer>,
    /// Confidence of the producing delta
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Entity ids the delta touched
    #[serde(default)]
    pub touched: Vec<String>,
    /// When the draft was appended
    pub created_at: DateTime<Utc>,
}

/// A refinement session: prompt, draft chain and lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Session id, serialized as `session_id`
    #[serde(rename = "session_id")]
    pub id: Uuid,

    /// The natural-language request the session started from
    pub prompt: String,

    /// Lifecycle status
    pub status: SessionStatus,

    /// Ordered, append-only; `drafts[i].version == i`
    pub drafts: Vec<Draft>,

    /// Open hole ids on the latest draft
    pub open_holes: BTreeSet<String>,

    /// When the session was opened
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Set by `finalize`
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
    /// Set by `delete`
    #[serde(default)]
    pub abandoned_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Active session over its initial draft.
    pub fn new(prompt: impl Into<String>, initial: Draft, open_holes: BTreeSet<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            status: SessionStatus::Active,
            drafts: vec![initial],
            open_holes,
            created_at: now,
            updated_at: now,
            finalized_at: None,
            abandoned_at: None,
        }
    }

    /// The newest draft.
    pub fn latest_draft(&self) -> Option<&Draft> {
        self.drafts.last()
    }

    /// Version of the newest draft.
    pub fn current_version(&self) -> Option<u32> {
        self.latest_draft().map(|d| d.version)
    }

    /// The draft at `version`.
    pub fn draft_at(&self, version: u32) -> Option<&Draft> {
        self.drafts.iter().find(|d| d.version == version)
    }

    /// Whether the session still accepts resolutions.
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Whether `finalize` would succeed right now.
    pub fn is_ready(&self) -> bool {
        self.open_holes.is_empty() && self.latest_draft().is_some_and(Draft::is_valid)
    }

    /// Append the successor of the latest draft and replace the open-hole set.
    pub fn append_draft(&mut self, draft: Draft, open_holes: BTreeSet<String>) {
        self.drafts.push(draft);
        self.open_holes = open_holes;
        self.updated_at = Utc::now();
    }

    /// Replace a `pending` verdict on the latest draft. Any other verdict is
    /// final; returns whether anything changed.
    pub fn upgrade_pending_validation(&mut self, report: ValidationReport) -> bool {
        match self.drafts.last_mut() {
            Some(draft) if draft.validation_status == ValidationStatus::Pending => {
                draft.validation_status = report.status;
                draft.diagnostics = report.diagnostics;
                self.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Move to `finalized`.
    pub fn finalize(&mut self) {
        let now = Utc::now();
        self.status = SessionStatus::Finalized;
        self.finalized_at = Some(now);
        self.updated_at = now;
    }

    /// Move to `abandoned`, keeping the history.
    pub fn abandon(&mut self) {
        let now = Utc::now();
        self.status = SessionStatus::Abandoned;
        self.abandoned_at = Some(now);
        self.updated_at = now;
    }

    /// One audit line per draft, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.drafts
            .iter()
            .map(|d| HistoryEntry {
                version: d.version,
                validation_status: d.validation_status,
                reason: d.delta.as_ref().map(|delta| delta.reason.clone()),
                produced_by: d.delta.as_ref().map(|delta| delta.produced_by.clone()),
                confidence: d.delta.as_ref().map(|delta| delta.confidence),
                touched: d
                    .delta
                    .as_ref()
                    .map(|delta| delta.touched_ids().into_iter().collect())
                    .unwrap_or_default(),
                created_at: d.created_at,
            })
            .collect()
    }
}
