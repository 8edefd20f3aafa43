// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the progress projection repository.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::repositories::ProgressRepository;
use docuflow_domain::{EngineError, JobId, JobState, PipelineProgress};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteProgressRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteProgressRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl ProgressRepository for SqliteProgressRepository {
    async fn upsert(&self, progress: &PipelineProgress) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("progress upsert").await?;
        sqlx::query(
            "INSERT INTO pipeline_progress \
             (job_id, stage_count, completed_stages, percentage_complete, current_stage_name, \
              status, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (job_id) DO UPDATE SET \
               stage_count = excluded.stage_count, \
               completed_stages = excluded.completed_stages, \
               percentage_complete = excluded.percentage_complete, \
               current_stage_name = excluded.current_stage_name, \
               status = excluded.status, \
               updated_at = excluded.updated_at",
        )
        .bind(progress.job_id.to_string())
        .bind(progress.stage_count)
        .bind(progress.completed_stages)
        .bind(progress.percentage_complete)
        .bind(&progress.current_stage_name)
        .bind(progress.status.as_str())
        .bind(row::fmt_ts(&progress.updated_at))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("upsert progress", e))?;
        Ok(())
    }

    async fn find(&self, job_id: JobId) -> Result<Option<PipelineProgress>, EngineError> {
        let pool = self.manager.tenant_pool("progress lookup").await?;
        let found = sqlx::query("SELECT * FROM pipeline_progress WHERE job_id = ?")
            .bind(job_id.to_string())
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find progress", e))?;
        found
            .map(|r| {
                Ok(PipelineProgress {
                    job_id: row::parse_id(&r.get::<String, _>("job_id"))?,
                    stage_count: r.get("stage_count"),
                    completed_stages: r.get("completed_stages"),
                    percentage_complete: r.get("percentage_complete"),
                    current_stage_name: r.get("current_stage_name"),
                    status: JobState::from_str(&r.get::<String, _>("status"))?,
                    updated_at: row::parse_ts(&r.get::<String, _>("updated_at"))?,
                })
            })
            .transpose()
    }
}
