use std::collections::VecDeque;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::adapters::sqlite::{parse_datetime, parse_json_or_default};
use crate::domain::mandate::{ContentType, Mandate, MandateStatus};
use crate::domain::pattern::{Maturity, MaturityState, Pattern, PatternKind};
use crate::error::CoreError;
use crate::ports::PolicyStore;

pub struct SqlitePolicyStore {
    pool: SqlitePool,
}

impl SqlitePolicyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_mandate(row: &sqlx::sqlite::SqliteRow) -> Result<Mandate, CoreError> {
        let id_str: String = row.try_get("id").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let content_type_str: String = row.try_get("content_type").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let status_str: String = row.try_get("status").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let tags_json: Option<String> = row.try_get("tags").ok();
        let metadata_str: Option<String> = row.try_get("metadata").ok().flatten();
        let votes_json: String = row.try_get("votes").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let created_at: String = row.try_get("created_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        Ok(Mandate {
            id: Uuid::parse_str(&id_str).map_err(|e| CoreError::validation(e.to_string()))?,
            content: row.try_get("content").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            content_type: parse_content_type(&content_type_str),
            author: row.try_get("author").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            created_at: parse_datetime(&created_at).map_err(CoreError::from)?,
            status: parse_mandate_status(&status_str),
            tags: parse_json_or_default(tags_json).map_err(CoreError::from)?,
            metadata: metadata_str.map(|s| serde_json::from_str(&s)).transpose().map_err(|e| CoreError::validation(e.to_string()))?,
            votes: serde_json::from_str(&votes_json).map_err(|e| CoreError::validation(e.to_string()))?,
        })
    }

    fn row_to_pattern(row: &sqlx::sqlite::SqliteRow) -> Result<Pattern, CoreError> {
        let kind_str: String = row.try_get("kind").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let tags_json: Option<String> = row.try_get("tags").ok();
        let example_cells_json: Option<String> = row.try_get("example_cells").ok();
        let observations_json: String = row.try_get("observations").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let maturity_state_str: String = row.try_get("maturity_state").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let last_validated: String = row.try_get("last_validated").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let promoted_at: Option<String> = row.try_get("promoted_at").ok().flatten();
        let deprecated_at: Option<String> = row.try_get("deprecated_at").ok().flatten();
        let created_at: String = row.try_get("created_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        let updated_at: String = row.try_get("updated_at").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;

        let example_cells: Vec<String> = parse_json_or_default(example_cells_json).map_err(CoreError::from)?;

        Ok(Pattern {
            id: row.try_get("id").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            content: row.try_get("content").map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?,
            kind: parse_pattern_kind(&kind_str),
            is_negative: row.try_get::<i64, _>("is_negative").unwrap_or(0) != 0,
            success_count: row.try_get::<i64, _>("success_count").unwrap_or(0) as u32,
            failure_count: row.try_get::<i64, _>("failure_count").unwrap_or(0) as u32,
            tags: parse_json_or_default(tags_json).map_err(CoreError::from)?,
            example_cells: VecDeque::from(example_cells),
            created_at: parse_datetime(&created_at).map_err(CoreError::from)?,
            updated_at: parse_datetime(&updated_at).map_err(CoreError::from)?,
            reason: row.try_get("reason").ok().flatten(),
            observations: serde_json::from_str(&observations_json).map_err(|e| CoreError::validation(e.to_string()))?,
            maturity: Maturity {
                state: parse_maturity_state(&maturity_state_str),
                helpful_count: row.try_get::<f64, _>("helpful_count").unwrap_or(0.0),
                harmful_count: row.try_get::<f64, _>("harmful_count").unwrap_or(0.0),
                last_validated: parse_datetime(&last_validated).map_err(CoreError::from)?,
                promoted_at: promoted_at.map(|s| parse_datetime(&s)).transpose().map_err(CoreError::from)?,
                deprecated_at: deprecated_at.map(|s| parse_datetime(&s)).transpose().map_err(CoreError::from)?,
            },
        })
    }
}

fn parse_content_type(s: &str) -> ContentType {
    match s {
        "tip" => ContentType::Tip,
        "lore" => ContentType::Lore,
        "snippet" => ContentType::Snippet,
        "feature_request" => ContentType::FeatureRequest,
        _ => ContentType::Idea,
    }
}

fn render_content_type(c: ContentType) -> &'static str {
    match c {
        ContentType::Idea => "idea",
        ContentType::Tip => "tip",
        ContentType::Lore => "lore",
        ContentType::Snippet => "snippet",
        ContentType::FeatureRequest => "feature_request",
    }
}

fn parse_mandate_status(s: &str) -> MandateStatus {
    match s {
        "established" => MandateStatus::Established,
        "mandate" => MandateStatus::Mandate,
        "rejected" => MandateStatus::Rejected,
        _ => MandateStatus::Candidate,
    }
}

fn render_mandate_status(s: MandateStatus) -> &'static str {
    match s {
        MandateStatus::Candidate => "candidate",
        MandateStatus::Established => "established",
        MandateStatus::Mandate => "mandate",
        MandateStatus::Rejected => "rejected",
    }
}

fn parse_pattern_kind(s: &str) -> PatternKind {
    match s {
        "anti_pattern" => PatternKind::AntiPattern,
        _ => PatternKind::Pattern,
    }
}

fn render_pattern_kind(k: PatternKind) -> &'static str {
    match k {
        PatternKind::Pattern => "pattern",
        PatternKind::AntiPattern => "anti_pattern",
    }
}

fn parse_maturity_state(s: &str) -> MaturityState {
    match s {
        "established" => MaturityState::Established,
        "proven" => MaturityState::Proven,
        "deprecated" => MaturityState::Deprecated,
        _ => MaturityState::Candidate,
    }
}

fn render_maturity_state(s: MaturityState) -> &'static str {
    match s {
        MaturityState::Candidate => "candidate",
        MaturityState::Established => "established",
        MaturityState::Proven => "proven",
        MaturityState::Deprecated => "deprecated",
    }
}

#[async_trait]
impl PolicyStore for SqlitePolicyStore {
    async fn save_mandate(&self, mandate: Mandate) -> Result<(), CoreError> {
        let votes_json = serde_json::to_string(&mandate.votes).map_err(|e| CoreError::validation(e.to_string()))?;
        let tags_json = serde_json::to_string(&mandate.tags).map_err(|e| CoreError::validation(e.to_string()))?;
        let metadata_str = mandate.metadata.as_ref().map(serde_json::to_string).transpose().map_err(|e| CoreError::validation(e.to_string()))?;
        sqlx::query(
            "INSERT INTO mandates (id, content, content_type, author, status, tags, metadata, votes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET status = excluded.status, tags = excluded.tags, metadata = excluded.metadata, votes = excluded.votes",
        )
        .bind(mandate.id.to_string())
        .bind(&mandate.content)
        .bind(render_content_type(mandate.content_type))
        .bind(&mandate.author)
        .bind(render_mandate_status(mandate.status))
        .bind(tags_json)
        .bind(metadata_str)
        .bind(votes_json)
        .bind(mandate.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get_mandate(&self, id: Uuid) -> Result<Mandate, CoreError> {
        let row = sqlx::query("SELECT * FROM mandates WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?
            .ok_or_else(|| CoreError::not_found(format!("mandate {id}")))?;
        Self::row_to_mandate(&row)
    }

    async fn list_mandates(&self) -> Result<Vec<Mandate>, CoreError> {
        let rows = sqlx::query("SELECT * FROM mandates ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        rows.iter().map(Self::row_to_mandate).collect()
    }

    async fn save_pattern(&self, pattern: Pattern) -> Result<(), CoreError> {
        let tags_json = serde_json::to_string(&pattern.tags).map_err(|e| CoreError::validation(e.to_string()))?;
        let example_cells: Vec<&String> = pattern.example_cells.iter().collect();
        let example_cells_json = serde_json::to_string(&example_cells).map_err(|e| CoreError::validation(e.to_string()))?;
        let observations_json = serde_json::to_string(&pattern.observations).map_err(|e| CoreError::validation(e.to_string()))?;
        sqlx::query(
            "INSERT INTO patterns (
                 id, content, kind, is_negative, success_count, failure_count, tags, example_cells, reason,
                 observations, maturity_state, helpful_count, harmful_count, last_validated, promoted_at, deprecated_at,
                 created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 success_count = excluded.success_count, failure_count = excluded.failure_count,
                 example_cells = excluded.example_cells, reason = excluded.reason, observations = excluded.observations,
                 maturity_state = excluded.maturity_state, helpful_count = excluded.helpful_count,
                 harmful_count = excluded.harmful_count, last_validated = excluded.last_validated,
                 promoted_at = excluded.promoted_at, deprecated_at = excluded.deprecated_at, updated_at = excluded.updated_at",
        )
        .bind(&pattern.id)
        .bind(&pattern.content)
        .bind(render_pattern_kind(pattern.kind))
        .bind(i64::from(pattern.is_negative))
        .bind(i64::from(pattern.success_count))
        .bind(i64::from(pattern.failure_count))
        .bind(tags_json)
        .bind(example_cells_json)
        .bind(&pattern.reason)
        .bind(observations_json)
        .bind(render_maturity_state(pattern.maturity.state))
        .bind(pattern.maturity.helpful_count)
        .bind(pattern.maturity.harmful_count)
        .bind(pattern.maturity.last_validated.to_rfc3339())
        .bind(pattern.maturity.promoted_at.map(|t| t.to_rfc3339()))
        .bind(pattern.maturity.deprecated_at.map(|t| t.to_rfc3339()))
        .bind(pattern.created_at.to_rfc3339())
        .bind(pattern.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        Ok(())
    }

    async fn get_pattern(&self, id: &str) -> Result<Pattern, CoreError> {
        let row = sqlx::query("SELECT * FROM patterns WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?
            .ok_or_else(|| CoreError::not_found(format!("pattern {id}")))?;
        Self::row_to_pattern(&row)
    }

    async fn list_patterns(&self) -> Result<Vec<Pattern>, CoreError> {
        let rows = sqlx::query("SELECT * FROM patterns ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::subsystem_unavailable(e.to_string()))?;
        rows.iter().map(Self::row_to_pattern).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::mandate::VoteType;
    use crate::domain::pattern::ObservationKind;

    async fn store() -> SqlitePolicyStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqlitePolicyStore::new(pool)
    }

    #[tokio::test]
    async fn save_and_get_mandate_round_trips() {
        let store = store().await;
        let mut mandate = Mandate::new("t", ContentType::Tip, "alice");
        mandate.cast_vote("a", VoteType::Upvote, 1.0).unwrap();
        let id = mandate.id;
        store.save_mandate(mandate).await.unwrap();
        let fetched = store.get_mandate(id).await.unwrap();
        assert_eq!(fetched.votes.len(), 1);
    }

    #[tokio::test]
    async fn missing_mandate_is_not_found() {
        let store = store().await;
        assert!(matches!(store.get_mandate(Uuid::new_v4()).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn save_and_get_pattern_round_trips_with_maturity() {
        let store = store().await;
        let mut pattern = Pattern::new("batch writes", Vec::new());
        for _ in 0..5 {
            pattern.record_observation(ObservationKind::Helpful);
        }
        let id = pattern.id.clone();
        store.save_pattern(pattern).await.unwrap();
        let fetched = store.get_pattern(&id).await.unwrap();
        assert_eq!(fetched.maturity.state, MaturityState::Proven);
    }

    #[tokio::test]
    async fn list_patterns_returns_all_saved() {
        let store = store().await;
        store.save_pattern(Pattern::new("a", Vec::new())).await.unwrap();
        store.save_pattern(Pattern::new("b", Vec::new())).await.unwrap();
        assert_eq!(store.list_patterns().await.unwrap().len(), 2);
    }
}
