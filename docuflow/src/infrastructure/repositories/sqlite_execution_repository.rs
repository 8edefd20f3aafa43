// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the processor execution repository.
//!
//! `insert_pending` rides the `UNIQUE (job_id, step_id, attempt)` index with
//! `ON CONFLICT DO NOTHING`: a duplicate orchestrator invocation observes
//! zero affected rows, loads the existing execution, and no-ops instead of
//! double-recording the step.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::repositories::ExecutionRepository;
use docuflow_domain::{EngineError, ExecutionId, ExecutionState, JobId, ProcessorExecution};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteExecutionRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteExecutionRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<ProcessorExecution, EngineError> {
        let output = r
            .get::<Option<String>, _>("output")
            .as_deref()
            .map(row::parse_json)
            .transpose()?;
        Ok(ProcessorExecution::from_parts(
            row::parse_id(&r.get::<String, _>("id"))?,
            row::parse_id(&r.get::<String, _>("job_id"))?,
            r.get("processor_slug"),
            r.get("step_id"),
            r.get("attempt"),
            ExecutionState::from_str(&r.get::<String, _>("state"))?,
            r.get("input_digest"),
            output,
            row::parse_json(&r.get::<String, _>("config_snapshot"))?,
            r.get("tokens_used"),
            r.get("cost_credits"),
            r.get("duration_ms"),
            row::parse_opt_ts(r.get("started_at"))?,
            row::parse_opt_ts(r.get("completed_at"))?,
            r.get("error"),
            row::parse_ts(&r.get::<String, _>("created_at"))?,
        ))
    }
}

#[async_trait]
impl ExecutionRepository for SqliteExecutionRepository {
    async fn insert_pending(&self, execution: &ProcessorExecution) -> Result<bool, EngineError> {
        let pool = self.manager.tenant_pool("execution insert").await?;
        let result = sqlx::query(
            "INSERT INTO processor_executions \
             (id, job_id, processor_slug, step_id, attempt, state, input_digest, output, \
              config_snapshot, tokens_used, cost_credits, duration_ms, started_at, \
              completed_at, error, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (job_id, step_id, attempt) DO NOTHING",
        )
        .bind(execution.id().to_string())
        .bind(execution.job_id().to_string())
        .bind(execution.processor_slug())
        .bind(execution.step_id())
        .bind(execution.attempt())
        .bind(execution.state().as_str())
        .bind(execution.input_digest())
        .bind(execution.output().map(row::to_json).transpose()?)
        .bind(row::to_json(execution.config_snapshot())?)
        .bind(execution.tokens_used())
        .bind(execution.cost_credits())
        .bind(execution.duration_ms())
        .bind(row::fmt_opt_ts(execution.started_at()))
        .bind(row::fmt_opt_ts(execution.completed_at()))
        .bind(execution.error())
        .bind(row::fmt_ts(execution.created_at()))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("insert execution", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn save(&self, execution: &ProcessorExecution) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("execution save").await?;
        sqlx::query(
            "UPDATE processor_executions SET state = ?, output = ?, tokens_used = ?, \
             cost_credits = ?, duration_ms = ?, started_at = ?, completed_at = ?, error = ? \
             WHERE id = ?",
        )
        .bind(execution.state().as_str())
        .bind(execution.output().map(row::to_json).transpose()?)
        .bind(execution.tokens_used())
        .bind(execution.cost_credits())
        .bind(execution.duration_ms())
        .bind(row::fmt_opt_ts(execution.started_at()))
        .bind(row::fmt_opt_ts(execution.completed_at()))
        .bind(execution.error())
        .bind(execution.id().to_string())
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("save execution", e))?;
        Ok(())
    }

    async fn find(
        &self,
        job_id: JobId,
        step_id: &str,
        attempt: i64,
    ) -> Result<Option<ProcessorExecution>, EngineError> {
        let pool = self.manager.tenant_pool("execution lookup").await?;
        let found = sqlx::query(
            "SELECT * FROM processor_executions WHERE job_id = ? AND step_id = ? AND attempt = ?",
        )
        .bind(job_id.to_string())
        .bind(step_id)
        .bind(attempt)
        .fetch_optional(&pool)
        .await
        .map_err(|e| row::db_err("find execution", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<ProcessorExecution>, EngineError> {
        let pool = self.manager.tenant_pool("execution list").await?;
        let rows = sqlx::query(
            "SELECT * FROM processor_executions WHERE job_id = ? ORDER BY created_at, attempt",
        )
        .bind(job_id.to_string())
        .fetch_all(&pool)
        .await
        .map_err(|e| row::db_err("list executions", e))?;
        rows.iter().map(Self::map).collect()
    }

    async fn transition_state(
        &self,
        id: ExecutionId,
        from: ExecutionState,
        to: ExecutionState,
    ) -> Result<bool, EngineError> {
        docuflow_domain::state_machine::ensure_transition(
            docuflow_domain::Machine::Execution,
            from.as_str(),
            to.as_str(),
        )?;
        let pool = self.manager.tenant_pool("execution transition").await?;
        let result = sqlx::query(
            "UPDATE processor_executions SET state = ? WHERE id = ? AND state = ?",
        )
        .bind(to.as_str())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("execution transition", e))?;
        Ok(result.rows_affected() == 1)
    }
}
