//! Session CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::commands::open_engine;
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{
    AssistSuggestion, Config, Draft, HistoryEntry, Resolution, ResolutionType, Session, SessionStatus, Severity,
};
use crate::services::{AmbiguityDetector, DeltaEngine, SessionService};

/// Arguments for `specforge session`.
#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Session subcommand to run
    #[command(subcommand)]
    pub command: SessionCommands,
}

/// Session subcommands.
#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Open a session from a natural-language prompt
    Create {
        /// The prompt to translate
        prompt: String,
    },
    /// List sessions, newest first
    List {
        /// Filter by status (active, finalized, abandoned)
        #[arg(short, long)]
        status: Option<String>,
        /// Maximum number of sessions
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Show a session and its current draft
    Show {
        session_id: Uuid,
    },
    /// Resolve an open hole
    Resolve {
        session_id: Uuid,
        hole_id: String,
        /// Resolution text (a type, a name, a sentence or a predicate)
        text: String,
        /// Resolution type; inferred from the hole when omitted
        #[arg(short = 't', long = "type", value_parser = parse_resolution_type)]
        resolution_type: Option<ResolutionType>,
    },
    /// Show ranked suggestions for the open holes
    Assists {
        session_id: Uuid,
    },
    /// Re-run validation on the latest draft
    Validate {
        session_id: Uuid,
    },
    /// Finalize a ready session
    Finalize {
        session_id: Uuid,
    },
    /// Abandon a session
    Delete {
        session_id: Uuid,
    },
    /// Show draft history, or a single draft with --version
    History {
        session_id: Uuid,
        #[arg(long)]
        version: Option<u32>,
    },
}

fn parse_resolution_type(s: &str) -> Result<ResolutionType, String> {
    ResolutionType::from_str(s).ok_or_else(|| {
        format!("unknown resolution type '{s}' (expected clarify_intent, specify_type, name_entity, describe_effect or add_constraint)")
    })
}

/// One session with its latest draft.
#[derive(Debug, Serialize)]
pub struct SessionDetailOutput {
    /// The session
    #[serde(flatten)]
    pub session: Session,
}

impl CommandOutput for SessionDetailOutput {
    fn to_human(&self) -> String {
        let session = &self.session;
        let mut lines = vec![
            format!("Session: {}", session.id),
            format!("Status:  {}", session.status),
            format!("Prompt:  {}", session.prompt),
            format!("Created: {}", session.created_at.format("%Y-%m-%d %H:%M:%S")),
        ];
        if let Some(at) = session.finalized_at {
            lines.push(format!("Finalized: {}", at.format("%Y-%m-%d %H:%M:%S")));
        }
        if let Some(at) = session.abandoned_at {
            lines.push(format!("Abandoned: {}", at.format("%Y-%m-%d %H:%M:%S")));
        }

        if let Some(draft) = session.latest_draft() {
            lines.push(String::new());
            lines.push(format!("Draft v{} ({})", draft.version, draft.validation_status));
            for diagnostic in &draft.diagnostics {
                lines.push(format!("  ! {diagnostic}"));
            }
            match serde_json::to_string_pretty(&draft.ir) {
                Ok(ir) => lines.push(ir),
                Err(e) => lines.push(format!("  <unrenderable draft: {e}>")),
            }
        }

        if session.open_holes.is_empty() {
            lines.push("\nNo open holes.".to_string());
        } else {
            lines.push(format!(
                "\nOpen holes: {}",
                session.open_holes.iter().cloned().collect::<Vec<_>>().join(", ")
            ));
        }
        lines.join("\n")
    }
}

/// Result of `specforge session list`.
#[derive(Debug, Serialize)]
pub struct SessionListOutput {
    /// Listed sessions
    pub sessions: Vec<Session>,
    /// Number of sessions listed
    pub total: usize,
}

impl CommandOutput for SessionListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["ID", "STATUS", "DRAFT", "HOLES", "PROMPT", "CREATED"]);
        for session in &self.sessions {
            let draft = session
                .latest_draft()
                .map(|d| format!("v{} {}", d.version, d.validation_status))
                .unwrap_or_default();
            table.add_row(vec![
                session.id.to_string(),
                session.status.to_string(),
                draft,
                session.open_holes.len().to_string(),
                truncate(&session.prompt, 40),
                session.created_at.format("%Y-%m-%d %H:%M").to_string(),
            ]);
        }
        render_list("session", &table, self.total)
    }
}

/// Assists for a session.
#[derive(Debug, Serialize)]
pub struct AssistListOutput {
    /// Session queried
    pub session_id: Uuid,
    /// Assists for its open holes
    pub assists: Vec<AssistSuggestion>,
}

impl CommandOutput for AssistListOutput {
    fn to_human(&self) -> String {
        if self.assists.is_empty() {
            return "No open holes.".to_string();
        }

        let mut table = list_table(&["RANK", "HOLE", "SEVERITY", "CONFIDENCE", "SUGGESTION", "RULE"]);
        for assist in &self.assists {
            let severity = match assist.severity {
                Severity::Omission => "omission",
                Severity::Contradiction => "contradiction",
            };
            let (text, rule) = assist
                .suggestions
                .first()
                .map_or(("-".to_string(), "-".to_string()), |s| {
                    (truncate(&s.text, 40), s.source_rule_id.clone())
                });
            table.add_row(vec![
                assist.rank.to_string(),
                assist.hole_id.clone(),
                severity.to_string(),
                format!("{:.2}", assist.confidence),
                text,
                rule,
            ]);
        }
        table.to_string()
    }
}

/// Audit history of a session.
#[derive(Debug, Serialize)]
pub struct HistoryOutput {
    /// Session queried
    pub session_id: Uuid,
    /// One entry per draft
    pub history: Vec<HistoryEntry>,
}

impl CommandOutput for HistoryOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["VERSION", "VALIDATION", "PRODUCER", "CONFIDENCE", "TOUCHED", "REASON"]);
        for entry in &self.history {
            table.add_row(vec![
                entry.version.to_string(),
                entry.validation_status.to_string(),
                entry.produced_by.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".into()),
                entry.confidence.map_or_else(|| "-".into(), |c| format!("{c:.2}")),
                entry.touched.join(", "),
                entry.reason.as_deref().map_or_else(|| "initial draft".into(), |r| truncate(r, 40)),
            ]);
        }
        table.to_string()
    }
}

/// A single draft of a session.
#[derive(Debug, Serialize)]
pub struct DraftOutput {
    /// Session queried
    pub session_id: Uuid,
    /// The draft
    #[serde(flatten)]
    pub draft: Draft,
}

impl CommandOutput for DraftOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Draft v{} of {} ({})",
            self.draft.version, self.session_id, self.draft.validation_status
        )];
        if let Some(delta) = &self.draft.delta {
            lines.push(format!("Produced by {}: {}", delta.produced_by, delta.reason));
        }
        for diagnostic in &self.draft.diagnostics {
            lines.push(format!("  ! {diagnostic}"));
        }
        match serde_json::to_string_pretty(&self.draft.ir) {
            Ok(ir) => lines.push(ir),
            Err(e) => lines.push(format!("<unrenderable draft: {e}>")),
        }
        lines.join("\n")
    }
}

/// Outcome of a state-changing session command.
#[derive(Debug, Serialize)]
pub struct SessionActionOutput {
    /// Whether the command succeeded
    pub success: bool,
    /// Human-readable summary
    pub message: String,
    /// Session after the command
    pub session: Session,
}

impl CommandOutput for SessionActionOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.session.status == SessionStatus::Active {
            if let Some(draft) = self.session.latest_draft() {
                lines.push(format!("Current draft: v{} ({})", draft.version, draft.validation_status));
            }
            if self.session.open_holes.is_empty() {
                lines.push("No open holes.".to_string());
            } else {
                lines.push(format!(
                    "Open holes: {}",
                    self.session.open_holes.iter().cloned().collect::<Vec<_>>().join(", ")
                ));
            }
        }
        lines.join("\n")
    }
}

fn action(message: String, session: Session) -> SessionActionOutput {
    SessionActionOutput {
        success: true,
        message,
        session,
    }
}

/// Pick the resolution type the named hole accepts. Unknown holes fall
/// through to the service, which reports them.
async fn infer_resolution_type(service: &SessionService, id: Uuid, hole_id: &str) -> Result<ResolutionType> {
    let session = service.get(id).await?;
    let hole = session
        .latest_draft()
        .and_then(|draft| AmbiguityDetector::new().detect(&draft.ir).into_iter().find(|h| h.id == hole_id));

    Ok(hole
        .and_then(|h| DeltaEngine::accepted_types(&h).first().copied())
        .unwrap_or(ResolutionType::SpecifyType))
}

/// Run a session subcommand.
pub async fn execute(args: SessionArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = open_engine(config).await?;
    let service = &engine.service;

    match args.command {
        SessionCommands::Create { prompt } => {
            let session = service.create(&prompt).await?;
            let message = format!("Session opened: {}", session.id);
            output(&action(message, session), json_mode);
        }

        SessionCommands::List { status, limit } => {
            let status = status
                .as_deref()
                .map(|s| SessionStatus::from_str(s).with_context(|| format!("Unknown session status: {s}")))
                .transpose()?;
            let sessions = service.list(status, limit).await?;
            let total = sessions.len();
            output(&SessionListOutput { sessions, total }, json_mode);
        }

        SessionCommands::Show { session_id } => {
            let session = service.get(session_id).await?;
            output(&SessionDetailOutput { session }, json_mode);
        }

        SessionCommands::Resolve {
            session_id,
            hole_id,
            text,
            resolution_type,
        } => {
            let kind = match resolution_type {
                Some(kind) => kind,
                None => infer_resolution_type(service, session_id, &hole_id).await?,
            };
            let session = service
                .resolve_hole(session_id, &hole_id, Resolution::new(kind, text))
                .await?;
            output(&action(format!("Resolved {hole_id} ({kind})"), session), json_mode);
        }

        SessionCommands::Assists { session_id } => {
            let assists = service.get_assists(session_id).await?;
            output(&AssistListOutput { session_id, assists }, json_mode);
        }

        SessionCommands::Validate { session_id } => {
            let session = service.revalidate(session_id).await?;
            let status = session
                .latest_draft()
                .map_or_else(|| "unknown".to_string(), |d| d.validation_status.to_string());
            output(&action(format!("Latest draft is {status}"), session), json_mode);
        }

        SessionCommands::Finalize { session_id } => {
            let session = service.finalize(session_id).await?;
            output(&action(format!("Session finalized: {session_id}"), session), json_mode);
        }

        SessionCommands::Delete { session_id } => {
            let session = service.delete(session_id).await?;
            output(&action(format!("Session abandoned: {session_id}"), session), json_mode);
        }

        SessionCommands::History { session_id, version } => match version {
            Some(version) => {
                let draft = service.draft_at(session_id, version).await?;
                output(&DraftOutput { session_id, draft }, json_mode);
            }
            None => {
                let history = service.history(session_id).await?;
                output(&HistoryOutput { session_id, history }, json_mode);
            }
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Intent, IrDocument, Signature, ValidationReport};
    use std::collections::BTreeSet;

    fn sample_session() -> Session {
        let ir = IrDocument::new(
            Intent {
                summary: "Add two numbers".into(),
                rationale: None,
            },
            Signature {
                name: "add".into(),
                parameters: vec![],
                returns: None,
            },
        );
        Session::new(
            "A function that adds two numbers",
            Draft::initial(ir, ValidationReport::valid()),
            BTreeSet::new(),
        )
    }

    #[test]
    fn test_parse_resolution_type_accepts_dashes() {
        assert_eq!(parse_resolution_type("specify-type").unwrap(), ResolutionType::SpecifyType);
        assert!(parse_resolution_type("guess").is_err());
    }

    #[test]
    fn test_session_list_human_output() {
        let out = SessionListOutput {
            sessions: vec![sample_session()],
            total: 1,
        };
        let human = out.to_human();
        assert!(human.contains("active"));
        assert!(human.contains("v0 valid"));
        assert!(human.starts_with("1 session:"), "{human}");
    }

    #[test]
    fn test_empty_assists_human_output() {
        let out = AssistListOutput {
            session_id: Uuid::nil(),
            assists: vec![],
        };
        assert_eq!(out.to_human(), "No open holes.");
    }
}
