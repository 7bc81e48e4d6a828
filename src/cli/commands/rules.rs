//! Inference rule CLI commands.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteRuleRepository};
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{Config, InferenceRule};
use crate::domain::ports::RuleRegistry;
use crate::services::{InferenceRuleRegistry, RuleRegistryConfig};

/// Arguments for `specforge rules`.
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Rules subcommand to run
    #[command(subcommand)]
    pub command: RulesCommands,
}

/// Rules subcommands.
#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// List stored inference rules with their confidence
    List {
        /// Include rules excluded by pruning
        #[arg(long)]
        all: bool,
    },
    /// Store the built-in rules that are not yet present
    Seed,
}

/// One rule row with its derived confidence.
#[derive(Debug, Serialize)]
pub struct RuleEntry {
    /// The stored rule
    #[serde(flatten)]
    pub rule: InferenceRule,
    /// Confidence derived from usage
    pub confidence: f64,
    /// Whether pruning excludes it
    pub pruned: bool,
}

/// Result of `specforge rules list`.
#[derive(Debug, Serialize)]
pub struct RuleListOutput {
    /// Listed rules
    pub rules: Vec<RuleEntry>,
    /// Number of rules listed
    pub total: usize,
}

impl CommandOutput for RuleListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["ID", "CONFIDENCE", "HELPFUL", "HARMFUL", "FIELDS", "STATE"]);
        for entry in &self.rules {
            let fields: Vec<&str> = entry.rule.pattern.fields.iter().map(|f| f.as_str()).collect();
            table.add_row(vec![
                entry.rule.id.clone(),
                format!("{:.2}", entry.confidence),
                entry.rule.helpful_count.to_string(),
                entry.rule.harmful_count.to_string(),
                fields.join(", "),
                if entry.pruned { "pruned" } else { "active" }.to_string(),
            ]);
        }
        render_list("rule", &table, self.total)
    }
}

/// Result of `specforge rules seed`.
#[derive(Debug, Serialize)]
pub struct SeedOutput {
    /// Whether seeding completed
    pub success: bool,
    /// Rules newly stored
    pub seeded: usize,
    /// Rules stored afterwards
    pub total: usize,
}

impl CommandOutput for SeedOutput {
    fn to_human(&self) -> String {
        format!("Seeded {} built-in rule(s); {} rule(s) stored.", self.seeded, self.total)
    }
}

/// Open the persistent registry without seeding.
async fn open_registry(config: &Config) -> Result<(InferenceRuleRegistry, RuleRegistryConfig)> {
    let url = database_url(&config.database.path);
    let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
        .await
        .context("Failed to open the rule store. Run 'specforge init' first.")?;

    let registry_config = RuleRegistryConfig::from(&config.rules);
    let registry =
        InferenceRuleRegistry::new(registry_config.clone()).with_repo(Arc::new(SqliteRuleRepository::new(pool)));
    registry.load_from_repo().await;
    Ok((registry, registry_config))
}

/// Run a rules subcommand.
pub async fn execute(args: RulesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let (registry, registry_config) = open_registry(config).await?;

    match args.command {
        RulesCommands::List { all } => {
            let now = Utc::now();
            let rules: Vec<RuleEntry> = registry
                .list()
                .await
                .into_iter()
                .map(|rule| RuleEntry {
                    confidence: rule.confidence(),
                    pruned: rule.is_pruned(now, registry_config.prune_window),
                    rule,
                })
                .filter(|entry| all || !entry.pruned)
                .collect();
            let total = rules.len();
            output(&RuleListOutput { rules, total }, json_mode);
        }
        RulesCommands::Seed => {
            let seeded = registry.seed_builtin().await;
            let total = registry.list().await.len();
            output(
                &SeedOutput {
                    success: true,
                    seeded,
                    total,
                },
                json_mode,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_list_marks_pruned_rules() {
        let rules: Vec<RuleEntry> = InferenceRuleRegistry::builtin_rules()
            .into_iter()
            .take(2)
            .enumerate()
            .map(|(i, rule)| RuleEntry {
                confidence: rule.confidence(),
                pruned: i == 1,
                rule,
            })
            .collect();
        let human = RuleListOutput { total: rules.len(), rules }.to_human();
        assert!(human.starts_with("2 rules:"));
        assert!(human.contains("pruned"));
        assert!(human.contains("active"));
    }
}
