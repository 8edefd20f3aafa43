// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Execution Entity
//!
//! One invocation of a processor within a document job. Executions are keyed
//! by `(job_id, step_id, attempt)`; the persistence layer enforces that key
//! with a unique index so a duplicate orchestrator invocation for the same
//! unit becomes a detectable no-op rather than a second execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::state_machine::{self, ExecutionState, Machine};
use crate::value_objects::{ExecutionId, JobId};

/// A single processor invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorExecution {
    id: ExecutionId,
    job_id: JobId,
    processor_slug: String,
    step_id: String,
    attempt: i64,
    state: ExecutionState,
    input_digest: String,
    output: Option<Value>,
    config_snapshot: Value,
    tokens_used: i64,
    cost_credits: f64,
    duration_ms: i64,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    error: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessorExecution {
    /// Creates a pending execution for one step attempt.
    pub fn new_pending(
        job_id: JobId,
        processor_slug: String,
        step_id: String,
        attempt: i64,
        input_digest: String,
        config_snapshot: Value,
    ) -> Self {
        ProcessorExecution {
            id: ExecutionId::new(),
            job_id,
            processor_slug,
            step_id,
            attempt,
            state: ExecutionState::Pending,
            input_digest,
            output: None,
            config_snapshot,
            tokens_used: 0,
            cost_credits: 0.0,
            duration_ms: 0,
            started_at: None,
            completed_at: None,
            error: None,
            created_at: chrono::Utc::now(),
        }
    }

    /// Rehydrates an execution from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ExecutionId,
        job_id: JobId,
        processor_slug: String,
        step_id: String,
        attempt: i64,
        state: ExecutionState,
        input_digest: String,
        output: Option<Value>,
        config_snapshot: Value,
        tokens_used: i64,
        cost_credits: f64,
        duration_ms: i64,
        started_at: Option<chrono::DateTime<chrono::Utc>>,
        completed_at: Option<chrono::DateTime<chrono::Utc>>,
        error: Option<String>,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        ProcessorExecution {
            id,
            job_id,
            processor_slug,
            step_id,
            attempt,
            state,
            input_digest,
            output,
            config_snapshot,
            tokens_used,
            cost_credits,
            duration_ms,
            started_at,
            completed_at,
            error,
            created_at,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn processor_slug(&self) -> &str {
        &self.processor_slug
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn attempt(&self) -> i64 {
        self.attempt
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn input_digest(&self) -> &str {
        &self.input_digest
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn config_snapshot(&self) -> &Value {
        &self.config_snapshot
    }

    pub fn tokens_used(&self) -> i64 {
        self.tokens_used
    }

    pub fn cost_credits(&self) -> f64 {
        self.cost_credits
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn started_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.started_at.as_ref()
    }

    pub fn completed_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.completed_at.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.created_at
    }

    /// Marks the start of execution. Used by the time-tracking hook.
    pub fn mark_started(&mut self, at: chrono::DateTime<chrono::Utc>) {
        self.started_at = Some(at);
    }

    /// Sets the measured wall-clock duration.
    pub fn set_duration_ms(&mut self, duration_ms: i64) {
        self.duration_ms = duration_ms.max(0);
    }

    /// Transitions `pending -> running`.
    pub fn begin(&mut self) -> Result<(), EngineError> {
        self.transition_to(ExecutionState::Running)?;
        if self.started_at.is_none() {
            self.started_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    /// Commits a successful result: `running -> completed`.
    pub fn complete(
        &mut self,
        output: Value,
        tokens_used: i64,
        cost_credits: f64,
    ) -> Result<(), EngineError> {
        self.transition_to(ExecutionState::Completed)?;
        self.output = Some(output);
        self.tokens_used = tokens_used.max(0);
        self.cost_credits = cost_credits.max(0.0);
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Records a failure: `running -> failed`.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), EngineError> {
        self.transition_to(ExecutionState::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Skips a pending execution: `pending -> skipped`.
    pub fn skip(&mut self) -> Result<(), EngineError> {
        self.transition_to(ExecutionState::Skipped)?;
        self.completed_at = Some(chrono::Utc::now());
        Ok(())
    }

    fn transition_to(&mut self, to: ExecutionState) -> Result<(), EngineError> {
        state_machine::ensure_transition(Machine::Execution, self.state.as_str(), to.as_str())?;
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn execution() -> ProcessorExecution {
        ProcessorExecution::new_pending(
            JobId::new(),
            "ocr".into(),
            "ocr".into(),
            1,
            "digest".into(),
            json!({"lang": "eng"}),
        )
    }

    #[test]
    fn completes_through_the_legal_path() {
        let mut execution = execution();
        execution.begin().unwrap();
        execution
            .complete(json!({"text": "hello"}), 12, 0.5)
            .unwrap();
        assert_eq!(execution.state(), ExecutionState::Completed);
        assert_eq!(execution.tokens_used(), 12);
        assert!(execution.completed_at().is_some());
    }

    #[test]
    fn cannot_complete_without_running() {
        let mut execution = execution();
        let err = execution.complete(json!({}), 0, 0.0).unwrap_err();
        assert!(matches!(err, EngineError::StateTransitionRejected { .. }));
    }

    #[test]
    fn negative_meters_are_clamped() {
        let mut execution = execution();
        execution.begin().unwrap();
        execution.complete(json!({}), -5, -1.0).unwrap();
        assert_eq!(execution.tokens_used(), 0);
        assert_eq!(execution.cost_credits(), 0.0);
    }
}
