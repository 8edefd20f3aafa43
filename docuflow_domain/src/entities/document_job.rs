// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Job Entity
//!
//! One execution instance of a campaign's pipeline for a specific document.
//! The job owns the frozen `pipeline_snapshot`, the step cursor, the retry
//! budget, and the append-only `error_log`.
//!
//! ## Invariants
//!
//! - `current_step_index < pipeline_snapshot.step_count()` while the job is
//!   in `pending`, `queued`, or `running`
//! - on completion `current_step_index == pipeline_snapshot.step_count()`
//! - `current_step_index` is non-decreasing across orchestrator invocations
//! - re-marking a failed job failed appends to `error_log`, never overwrites

use serde::{Deserialize, Serialize};

use crate::entities::campaign::{PipelineConfig, PipelineStep};
use crate::error::EngineError;
use crate::state_machine::{self, JobState, Machine};
use crate::value_objects::{CampaignId, DocumentId, JobId};

/// Default retry budget per step.
pub const DEFAULT_MAX_ATTEMPTS: i64 = 3;

/// One entry of a job's error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobErrorEntry {
    pub step_id: String,
    pub attempt: i64,
    pub kind: String,
    pub message: String,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

/// A pipeline run for a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentJob {
    id: JobId,
    uuid: uuid::Uuid,
    document_id: DocumentId,
    campaign_id: CampaignId,
    state: JobState,
    pipeline_snapshot: PipelineConfig,
    current_step_index: i64,
    attempts: i64,
    max_attempts: i64,
    error_log: Vec<JobErrorEntry>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl DocumentJob {
    /// Creates a pending job with the campaign's pipeline frozen in.
    pub fn new(
        document_id: DocumentId,
        campaign_id: CampaignId,
        pipeline_snapshot: PipelineConfig,
    ) -> Result<Self, EngineError> {
        pipeline_snapshot.validate()?;

        let now = chrono::Utc::now();

        Ok(DocumentJob {
            id: JobId::new(),
            uuid: uuid::Uuid::new_v4(),
            document_id,
            campaign_id,
            state: JobState::Pending,
            pipeline_snapshot,
            current_step_index: 0,
            attempts: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            error_log: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates a job from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: JobId,
        uuid: uuid::Uuid,
        document_id: DocumentId,
        campaign_id: CampaignId,
        state: JobState,
        pipeline_snapshot: PipelineConfig,
        current_step_index: i64,
        attempts: i64,
        max_attempts: i64,
        error_log: Vec<JobErrorEntry>,
        started_at: Option<chrono::DateTime<chrono::Utc>>,
        completed_at: Option<chrono::DateTime<chrono::Utc>>,
        created_at: chrono::DateTime<chrono::Utc>,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        DocumentJob {
            id,
            uuid,
            document_id,
            campaign_id,
            state,
            pipeline_snapshot,
            current_step_index,
            attempts,
            max_attempts,
            error_log,
            started_at,
            completed_at,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn uuid(&self) -> uuid::Uuid {
        self.uuid
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.campaign_id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn pipeline_snapshot(&self) -> &PipelineConfig {
        &self.pipeline_snapshot
    }

    pub fn current_step_index(&self) -> i64 {
        self.current_step_index
    }

    pub fn attempts(&self) -> i64 {
        self.attempts
    }

    pub fn max_attempts(&self) -> i64 {
        self.max_attempts
    }

    pub fn error_log(&self) -> &[JobErrorEntry] {
        &self.error_log
    }

    pub fn started_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.started_at.as_ref()
    }

    pub fn completed_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.completed_at.as_ref()
    }

    pub fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.created_at
    }

    pub fn updated_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.updated_at
    }

    pub fn step_count(&self) -> i64 {
        self.pipeline_snapshot.step_count() as i64
    }

    /// The step the cursor points at, if the pipeline is not exhausted.
    pub fn current_step(&self) -> Option<&PipelineStep> {
        self.pipeline_snapshot.step_at(self.current_step_index as usize)
    }

    /// True when every step has been committed.
    pub fn is_past_final_step(&self) -> bool {
        self.current_step_index >= self.step_count()
    }

    /// True when retries remain within the per-step budget.
    pub fn has_attempts_remaining(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Transitions the job, guarded by the state machine allow-list.
    /// `running -> running` is tolerated as an idempotent no-op so repeated
    /// orchestrator invocations for the same unit converge.
    pub fn transition_to(&mut self, to: JobState) -> Result<(), EngineError> {
        if self.state == JobState::Running && to == JobState::Running {
            return Ok(());
        }
        state_machine::ensure_transition(Machine::Job, self.state.as_str(), to.as_str())?;
        self.state = to;
        let now = chrono::Utc::now();
        match to {
            JobState::Running if self.started_at.is_none() => self.started_at = Some(now),
            JobState::Completed | JobState::Failed | JobState::Cancelled => {
                self.completed_at = Some(now)
            }
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }

    /// Advances the step cursor after a durably committed step and resets
    /// the per-step attempt counter.
    pub fn advance_step(&mut self) {
        self.current_step_index += 1;
        self.attempts = 0;
        self.updated_at = chrono::Utc::now();
    }

    /// Records one more attempt on the current step.
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
        self.updated_at = chrono::Utc::now();
    }

    /// Appends to the error log. The log is never truncated or overwritten.
    pub fn append_error(&mut self, entry: JobErrorEntry) {
        self.error_log.push(entry);
        self.updated_at = chrono::Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::campaign::PipelineStep;
    use serde_json::json;

    fn snapshot(ids: &[&str]) -> PipelineConfig {
        PipelineConfig {
            processors: ids
                .iter()
                .map(|id| PipelineStep {
                    id: (*id).into(),
                    processor_type: (*id).into(),
                    config: json!({}),
                })
                .collect(),
        }
    }

    fn job() -> DocumentJob {
        DocumentJob::new(DocumentId::new(), CampaignId::new(), snapshot(&["ocr", "cls", "ext"]))
            .unwrap()
    }

    #[test]
    fn cursor_stays_within_snapshot_until_completion() {
        let mut job = job();
        assert_eq!(job.current_step().unwrap().id, "ocr");
        job.advance_step();
        job.advance_step();
        assert_eq!(job.current_step().unwrap().id, "ext");
        job.advance_step();
        assert!(job.is_past_final_step());
        assert!(job.current_step().is_none());
    }

    #[test]
    fn advancing_resets_the_attempt_counter() {
        let mut job = job();
        job.record_attempt();
        job.record_attempt();
        assert_eq!(job.attempts(), 2);
        job.advance_step();
        assert_eq!(job.attempts(), 0);
    }

    #[test]
    fn running_to_running_is_idempotent() {
        let mut job = job();
        job.transition_to(JobState::Queued).unwrap();
        job.transition_to(JobState::Running).unwrap();
        let started = *job.started_at().unwrap();
        job.transition_to(JobState::Running).unwrap();
        assert_eq!(job.started_at(), Some(&started));
    }

    #[test]
    fn failed_to_failed_appends_not_overwrites() {
        let mut job = job();
        job.transition_to(JobState::Queued).unwrap();
        job.transition_to(JobState::Running).unwrap();
        job.transition_to(JobState::Failed).unwrap();
        job.append_error(JobErrorEntry {
            step_id: "ocr".into(),
            attempt: 3,
            kind: "pipeline".into(),
            message: "first".into(),
            occurred_at: chrono::Utc::now(),
        });
        job.transition_to(JobState::Failed).unwrap();
        job.append_error(JobErrorEntry {
            step_id: "ocr".into(),
            attempt: 3,
            kind: "pipeline".into(),
            message: "re-marked".into(),
            occurred_at: chrono::Utc::now(),
        });
        assert_eq!(job.error_log().len(), 2);
    }

    #[test]
    fn empty_snapshot_is_rejected_at_creation() {
        let err =
            DocumentJob::new(DocumentId::new(), CampaignId::new(), snapshot(&[])).unwrap_err();
        assert!(matches!(err, EngineError::ImporterValidationError { .. }));
    }
}
