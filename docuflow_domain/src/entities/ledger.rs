// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Ledger Rows and the Progress Projection
//!
//! Append-only records: the usage metering ledger and the immutable audit
//! trail. Neither is ever updated or deleted; the repository layer exposes
//! insert-only surfaces and the tenant schema carries rejecting triggers as
//! a backstop.
//!
//! `PipelineProgress` is the polled read-model row maintained alongside
//! orchestrator transitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::state_machine::JobState;
use crate::value_objects::{AuditEntryId, CampaignId, DocumentId, JobId, UsageEventId};

/// Metered event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEventType {
    Upload,
    Storage,
    ProcessorExecution,
    AiTask,
    ConnectorCall,
}

impl UsageEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageEventType::Upload => "upload",
            UsageEventType::Storage => "storage",
            UsageEventType::ProcessorExecution => "processor_execution",
            UsageEventType::AiTask => "ai_task",
            UsageEventType::ConnectorCall => "connector_call",
        }
    }
}

impl std::str::FromStr for UsageEventType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(UsageEventType::Upload),
            "storage" => Ok(UsageEventType::Storage),
            "processor_execution" => Ok(UsageEventType::ProcessorExecution),
            "ai_task" => Ok(UsageEventType::AiTask),
            "connector_call" => Ok(UsageEventType::ConnectorCall),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown usage event type: {}",
                s
            ))),
        }
    }
}

/// One append-only usage metering event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: UsageEventId,
    pub event_type: UsageEventType,
    pub units: i64,
    pub cost_credits: f64,
    pub campaign_id: Option<CampaignId>,
    pub document_id: Option<DocumentId>,
    pub job_id: Option<JobId>,
    pub occurred_at: chrono::DateTime<chrono::Utc>,
}

impl UsageEvent {
    pub fn new(event_type: UsageEventType, units: i64, cost_credits: f64) -> Self {
        UsageEvent {
            id: UsageEventId::new(),
            event_type,
            units,
            cost_credits,
            campaign_id: None,
            document_id: None,
            job_id: None,
            occurred_at: chrono::Utc::now(),
        }
    }

    pub fn for_campaign(mut self, campaign_id: CampaignId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn for_document(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }

    pub fn for_job(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }
}

/// One immutable audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub auditable_type: String,
    pub auditable_id: String,
    pub event: String,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub tags: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AuditEntry {
    pub fn new(
        auditable_type: impl Into<String>,
        auditable_id: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        AuditEntry {
            id: AuditEntryId::new(),
            auditable_type: auditable_type.into(),
            auditable_id: auditable_id.into(),
            event: event.into(),
            old_values: None,
            new_values: None,
            user_id: None,
            ip: None,
            tags: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Audit entry for a state transition, in old/new form.
    pub fn state_transition(
        auditable_type: impl Into<String>,
        auditable_id: impl Into<String>,
        from: &str,
        to: &str,
    ) -> Self {
        let mut entry = Self::new(auditable_type, auditable_id, "state_transition");
        entry.old_values = Some(serde_json::json!({ "state": from }));
        entry.new_values = Some(serde_json::json!({ "state": to }));
        entry
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Read-model row polled by progress APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub job_id: JobId,
    pub stage_count: i64,
    pub completed_stages: i64,
    pub percentage_complete: f64,
    pub current_stage_name: Option<String>,
    pub status: JobState,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl PipelineProgress {
    /// Builds the projection row for a job's current position.
    pub fn project(
        job_id: JobId,
        stage_count: i64,
        completed_stages: i64,
        current_stage_name: Option<String>,
        status: JobState,
    ) -> Self {
        let percentage_complete = if stage_count > 0 {
            (completed_stages as f64 / stage_count as f64) * 100.0
        } else {
            0.0
        };
        PipelineProgress {
            job_id,
            stage_count,
            completed_stages,
            percentage_complete,
            current_stage_name,
            status,
            updated_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_percentage_reaches_exactly_one_hundred() {
        let progress = PipelineProgress::project(JobId::new(), 3, 3, None, JobState::Completed);
        assert_eq!(progress.percentage_complete, 100.0);
        let partial = PipelineProgress::project(JobId::new(), 3, 1, Some("cls".into()), JobState::Running);
        assert!((partial.percentage_complete - 33.333).abs() < 0.01);
    }

    #[test]
    fn state_transition_entries_carry_old_and_new() {
        let entry = AuditEntry::state_transition("document_job", "j1", "running", "completed");
        assert_eq!(entry.old_values.unwrap()["state"], "running");
        assert_eq!(entry.new_values.unwrap()["state"], "completed");
    }
}
