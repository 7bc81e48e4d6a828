//! SQLite implementation of the RuleRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_json, parse_optional_datetime};
use crate::domain::errors::DomainResult;
use crate::domain::models::InferenceRule;
use crate::domain::ports::RuleRepository;

/// Rules stored in the `rules` table.
#[derive(Clone)]
pub struct SqliteRuleRepository {
    pool: SqlitePool,
}

impl SqliteRuleRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: String,
    pattern: String,
    resolution: String,
    helpful_count: i64,
    harmful_count: i64,
    domains: String,
    last_helpful: Option<String>,
    last_harmful: Option<String>,
    below_floor_since: Option<String>,
    created_at: String,
}

fn row_to_rule(row: RuleRow) -> DomainResult<InferenceRule> {
    Ok(InferenceRule {
        id: row.id,
        pattern: parse_json(&row.pattern)?,
        resolution: row.resolution,
        helpful_count: u64::try_from(row.helpful_count).unwrap_or(0),
        harmful_count: u64::try_from(row.harmful_count).unwrap_or(0),
        domains: parse_json(&row.domains)?,
        last_helpful: parse_optional_datetime(row.last_helpful)?,
        last_harmful: parse_optional_datetime(row.last_harmful)?,
        below_floor_since: parse_optional_datetime(row.below_floor_since)?,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl RuleRepository for SqliteRuleRepository {
    async fn upsert(&self, rule: &InferenceRule) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO inference_rules
               (id, pattern, resolution, helpful_count, harmful_count, domains,
                last_helpful, last_harmful, below_floor_since, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   pattern = excluded.pattern,
                   resolution = excluded.resolution,
                   helpful_count = excluded.helpful_count,
                   harmful_count = excluded.harmful_count,
                   domains = excluded.domains,
                   last_helpful = excluded.last_helpful,
                   last_harmful = excluded.last_harmful,
                   below_floor_since = excluded.below_floor_since,
                   updated_at = datetime('now')"#,
        )
        .bind(&rule.id)
        .bind(serde_json::to_string(&rule.pattern)?)
        .bind(&rule.resolution)
        .bind(i64::try_from(rule.helpful_count).unwrap_or(i64::MAX))
        .bind(i64::try_from(rule.harmful_count).unwrap_or(i64::MAX))
        .bind(serde_json::to_string(&rule.domains)?)
        .bind(rule.last_helpful.as_ref().map(format_datetime))
        .bind(rule.last_harmful.as_ref().map(format_datetime))
        .bind(rule.below_floor_since.as_ref().map(format_datetime))
        .bind(format_datetime(&rule.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<InferenceRule>> {
        let row: Option<RuleRow> = sqlx::query_as(
            r#"SELECT id, pattern, resolution, helpful_count, harmful_count, domains,
                      last_helpful, last_harmful, below_floor_since, created_at
               FROM inference_rules WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_rule).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<InferenceRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(
            r#"SELECT id, pattern, resolution, helpful_count, harmful_count, domains,
                      last_helpful, last_harmful, below_floor_since, created_at
               FROM inference_rules ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_rule).collect()
    }
}
