// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Progress & Metrics Read Models
//!
//! The polled views clients hit every couple of seconds. Both resolve a
//! document by its public UUID under the tenant binding; the transport in
//! front of them is an external collaborator.

use std::sync::Arc;

use serde::Serialize;

use docuflow_domain::repositories::{
    CampaignRepository, DocumentRepository, ExecutionRepository, JobRepository,
    ProgressRepository,
};
use docuflow_domain::{Campaign, EngineError, Processor};

use crate::infrastructure::registry::processor_registry::ProcessorRegistry;

/// `GET /documents/{uuid}/progress` equivalent.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressView {
    pub status: String,
    pub percentage_complete: f64,
    pub stage_count: i64,
    pub completed_stages: i64,
    pub current_stage: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// One row of `GET /documents/{uuid}/metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionMetricView {
    pub processor_id: String,
    pub processor: ProcessorSummary,
    pub duration_ms: i64,
    pub status: String,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessorSummary {
    pub name: String,
    pub category: String,
}

/// Read-model queries over a document's job.
pub struct DocumentReadModels {
    documents: Arc<dyn DocumentRepository>,
    jobs: Arc<dyn JobRepository>,
    executions: Arc<dyn ExecutionRepository>,
    progress: Arc<dyn ProgressRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    registry: Arc<ProcessorRegistry>,
}

impl DocumentReadModels {
    pub fn new(
        documents: Arc<dyn DocumentRepository>,
        jobs: Arc<dyn JobRepository>,
        executions: Arc<dyn ExecutionRepository>,
        progress: Arc<dyn ProgressRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        registry: Arc<ProcessorRegistry>,
    ) -> Self {
        Self {
            documents,
            jobs,
            executions,
            progress,
            campaigns,
            registry,
        }
    }

    /// Pipeline progress for a document, by public UUID.
    pub async fn progress(&self, document_uuid: uuid::Uuid) -> Result<ProgressView, EngineError> {
        let document = self
            .documents
            .find_by_uuid(document_uuid)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("document {}", document_uuid)))?;
        let job = self
            .jobs
            .find_by_document(document.id())
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job for document {}", document_uuid)))?;
        let projection = self
            .progress
            .find(job.id())
            .await?
            .ok_or_else(|| EngineError::not_found(format!("progress for job {}", job.id())))?;

        Ok(ProgressView {
            status: projection.status.as_str().to_string(),
            percentage_complete: projection.percentage_complete,
            stage_count: projection.stage_count,
            completed_stages: projection.completed_stages,
            current_stage: projection.current_stage_name,
            updated_at: projection.updated_at,
        })
    }

    /// Per-step execution metrics for a document, by public UUID.
    pub async fn metrics(
        &self,
        document_uuid: uuid::Uuid,
    ) -> Result<Vec<ExecutionMetricView>, EngineError> {
        let document = self
            .documents
            .find_by_uuid(document_uuid)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("document {}", document_uuid)))?;
        let job = self
            .jobs
            .find_by_document(document.id())
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job for document {}", document_uuid)))?;

        let executions = self.executions.list_for_job(job.id()).await?;
        let views = executions
            .into_iter()
            .map(|execution| {
                let summary = self
                    .registry
                    .resolve(execution.processor_slug())
                    .map(|processor| {
                        let descriptor = processor.describe();
                        ProcessorSummary {
                            name: descriptor.name,
                            category: descriptor.category.as_str().to_string(),
                        }
                    })
                    .unwrap_or_else(|| ProcessorSummary {
                        name: execution.processor_slug().to_string(),
                        category: "unknown".to_string(),
                    });
                ExecutionMetricView {
                    processor_id: execution.processor_slug().to_string(),
                    processor: summary,
                    duration_ms: execution.duration_ms(),
                    status: execution.state().as_str().to_string(),
                    completed_at: execution.completed_at().copied(),
                }
            })
            .collect();
        Ok(views)
    }

    /// Campaigns visible under the current tenant binding.
    pub async fn list_campaigns(&self) -> Result<Vec<Campaign>, EngineError> {
        self.campaigns.list().await
    }
}
