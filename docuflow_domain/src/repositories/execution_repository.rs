// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Processor execution repository port.
//!
//! Executions are keyed by `(job_id, step_id, attempt)`. `insert_pending`
//! reports duplicates instead of erroring so a second orchestrator
//! invocation for the same unit degrades to a no-op - the idempotence
//! property the orchestrator is tested against.

use async_trait::async_trait;

use crate::entities::processor_execution::ProcessorExecution;
use crate::error::EngineError;
use crate::state_machine::ExecutionState;
use crate::value_objects::{ExecutionId, JobId};

/// Persistence port for processor executions.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Inserts a pending execution. Returns `false` when the idempotency
    /// key already exists; the caller then loads the existing row instead.
    async fn insert_pending(&self, execution: &ProcessorExecution) -> Result<bool, EngineError>;

    /// Persists all mutable fields of an existing execution.
    async fn save(&self, execution: &ProcessorExecution) -> Result<(), EngineError>;

    async fn find(
        &self,
        job_id: JobId,
        step_id: &str,
        attempt: i64,
    ) -> Result<Option<ProcessorExecution>, EngineError>;

    /// All executions for a job, ordered by creation.
    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<ProcessorExecution>, EngineError>;

    /// Conditionally transitions state. Two concurrent completions resolve
    /// to exactly one `true` here.
    async fn transition_state(
        &self,
        id: ExecutionId,
        from: ExecutionState,
        to: ExecutionState,
    ) -> Result<bool, EngineError>;
}
