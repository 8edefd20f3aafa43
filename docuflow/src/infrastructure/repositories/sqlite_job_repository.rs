// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the document job repository.
//!
//! The guarded operations (`transition_state`, `advance_cursor`) are
//! conditional updates: the WHERE clause carries the expected prior state
//! or cursor position, so exactly one of two racing writers observes
//! `rows_affected == 1` and the other backs off and reloads.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::entities::document_job::JobErrorEntry;
use docuflow_domain::repositories::JobRepository;
use docuflow_domain::{
    CampaignId, DocumentId, DocumentJob, EngineError, JobId, JobState, PipelineConfig,
};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteJobRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteJobRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<DocumentJob, EngineError> {
        let snapshot: PipelineConfig = row::parse_json(&r.get::<String, _>("pipeline_snapshot"))?;
        let error_log: Vec<JobErrorEntry> = row::parse_json(&r.get::<String, _>("error_log"))?;
        Ok(DocumentJob::from_parts(
            row::parse_id(&r.get::<String, _>("id"))?,
            row::parse_uuid(&r.get::<String, _>("uuid"))?,
            row::parse_id(&r.get::<String, _>("document_id"))?,
            row::parse_id(&r.get::<String, _>("campaign_id"))?,
            JobState::from_str(&r.get::<String, _>("state"))?,
            snapshot,
            r.get("current_step_index"),
            r.get("attempts"),
            r.get("max_attempts"),
            error_log,
            row::parse_opt_ts(r.get("started_at"))?,
            row::parse_opt_ts(r.get("completed_at"))?,
            row::parse_ts(&r.get::<String, _>("created_at"))?,
            row::parse_ts(&r.get::<String, _>("updated_at"))?,
        ))
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &DocumentJob) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("job insert").await?;
        sqlx::query(
            "INSERT INTO document_jobs \
             (id, uuid, document_id, campaign_id, state, pipeline_snapshot, \
              current_step_index, attempts, max_attempts, error_log, started_at, \
              completed_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job.id().to_string())
        .bind(job.uuid().to_string())
        .bind(job.document_id().to_string())
        .bind(job.campaign_id().to_string())
        .bind(job.state().as_str())
        .bind(row::to_json(job.pipeline_snapshot())?)
        .bind(job.current_step_index())
        .bind(job.attempts())
        .bind(job.max_attempts())
        .bind(row::to_json(&job.error_log())?)
        .bind(row::fmt_opt_ts(job.started_at()))
        .bind(row::fmt_opt_ts(job.completed_at()))
        .bind(row::fmt_ts(job.created_at()))
        .bind(row::fmt_ts(job.updated_at()))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("insert job", e))?;
        Ok(())
    }

    async fn save(&self, job: &DocumentJob) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("job save").await?;
        sqlx::query(
            "UPDATE document_jobs SET state = ?, current_step_index = ?, attempts = ?, \
             error_log = ?, started_at = ?, completed_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(job.state().as_str())
        .bind(job.current_step_index())
        .bind(job.attempts())
        .bind(row::to_json(&job.error_log())?)
        .bind(row::fmt_opt_ts(job.started_at()))
        .bind(row::fmt_opt_ts(job.completed_at()))
        .bind(row::fmt_ts(job.updated_at()))
        .bind(job.id().to_string())
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("save job", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<DocumentJob>, EngineError> {
        let pool = self.manager.tenant_pool("job lookup").await?;
        let found = sqlx::query("SELECT * FROM document_jobs WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find job by id", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn find_by_uuid(&self, uuid: uuid::Uuid) -> Result<Option<DocumentJob>, EngineError> {
        let pool = self.manager.tenant_pool("job lookup").await?;
        let found = sqlx::query("SELECT * FROM document_jobs WHERE uuid = ?")
            .bind(uuid.to_string())
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find job by uuid", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn find_by_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Option<DocumentJob>, EngineError> {
        let pool = self.manager.tenant_pool("job lookup").await?;
        let found = sqlx::query(
            "SELECT * FROM document_jobs WHERE document_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(document_id.to_string())
        .fetch_optional(&pool)
        .await
        .map_err(|e| row::db_err("find job by document", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn transition_state(
        &self,
        id: JobId,
        from: JobState,
        to: JobState,
    ) -> Result<bool, EngineError> {
        docuflow_domain::state_machine::ensure_transition(
            docuflow_domain::Machine::Job,
            from.as_str(),
            to.as_str(),
        )?;
        let pool = self.manager.tenant_pool("job transition").await?;
        let now = row::fmt_ts(&chrono::Utc::now());
        let terminalizes = to.is_terminal();
        let starts = to == JobState::Running;
        let result = sqlx::query(
            "UPDATE document_jobs SET state = ?, updated_at = ?, \
             started_at = CASE WHEN ? AND started_at IS NULL THEN ? ELSE started_at END, \
             completed_at = CASE WHEN ? THEN ? ELSE completed_at END \
             WHERE id = ? AND state = ?",
        )
        .bind(to.as_str())
        .bind(&now)
        .bind(starts)
        .bind(&now)
        .bind(terminalizes)
        .bind(&now)
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("job transition", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn advance_cursor(&self, id: JobId, from_index: i64) -> Result<bool, EngineError> {
        let pool = self.manager.tenant_pool("job cursor advance").await?;
        let result = sqlx::query(
            "UPDATE document_jobs SET current_step_index = ?, attempts = 0, updated_at = ? \
             WHERE id = ? AND current_step_index = ?",
        )
        .bind(from_index + 1)
        .bind(row::fmt_ts(&chrono::Utc::now()))
        .bind(id.to_string())
        .bind(from_index)
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("job cursor advance", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn active_count_for_campaign(
        &self,
        campaign_id: CampaignId,
    ) -> Result<i64, EngineError> {
        let pool = self.manager.tenant_pool("job active count").await?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM document_jobs WHERE campaign_id = ? AND state IN ('queued', 'running')",
        )
        .bind(campaign_id.to_string())
        .fetch_one(&pool)
        .await
        .map_err(|e| row::db_err("job active count", e))?;
        Ok(count)
    }
}
