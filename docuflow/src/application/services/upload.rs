// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upload Document Action
//!
//! Ingestion entry point. The caller hands over an authenticated user id;
//! the action resolves the tenant from the user's membership, enforces the
//! campaign's intake constraints, stores the content, creates the Document
//! and its DocumentJob (with the pipeline frozen in), meters the upload,
//! audits, and dispatches step zero. No cross-tenant upload is possible:
//! everything after tenant resolution runs inside the binding.

use std::sync::Arc;

use tracing::info;

use docuflow_domain::entities::document::compute_sha256;

use docuflow_domain::repositories::{
    AuditLedger, CampaignRepository, DocumentRepository, JobRepository, ProgressRepository,
    UsageLedger,
};
use docuflow_domain::{
    AuditEntry, CampaignState, ContentStore, Document, DocumentJob, DocumentState, EngineError,
    JobState, PipelineProgress, Tenant, UsageEvent, UsageEventType, UserId,
};

use crate::application::services::dispatcher::JobDispatcher;
use crate::infrastructure::storage::file_store::document_storage_path;
use crate::infrastructure::tenancy::catalog::TenantCatalog;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

/// A successful ingestion: the public handles pollers use.
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub document_uuid: uuid::Uuid,
    pub job_uuid: uuid::Uuid,
}

/// The UploadDocument action.
pub struct UploadService {
    catalog: Arc<TenantCatalog>,
    connections: Arc<ConnectionManager>,
    campaigns: Arc<dyn CampaignRepository>,
    documents: Arc<dyn DocumentRepository>,
    jobs: Arc<dyn JobRepository>,
    usage: Arc<dyn UsageLedger>,
    audit: Arc<dyn AuditLedger>,
    progress: Arc<dyn ProgressRepository>,
    storage: Arc<dyn ContentStore>,
    dispatcher: JobDispatcher,
}

impl UploadService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<TenantCatalog>,
        connections: Arc<ConnectionManager>,
        campaigns: Arc<dyn CampaignRepository>,
        documents: Arc<dyn DocumentRepository>,
        jobs: Arc<dyn JobRepository>,
        usage: Arc<dyn UsageLedger>,
        audit: Arc<dyn AuditLedger>,
        progress: Arc<dyn ProgressRepository>,
        storage: Arc<dyn ContentStore>,
        dispatcher: JobDispatcher,
    ) -> Self {
        Self {
            catalog,
            connections,
            campaigns,
            documents,
            jobs,
            usage,
            audit,
            progress,
            storage,
            dispatcher,
        }
    }

    /// Ingests a document for the tenant the acting user belongs to.
    pub async fn upload(
        &self,
        acting_user: UserId,
        campaign_slug: &str,
        original_filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, EngineError> {
        let tenant = self
            .catalog
            .resolve_tenant_for_user(acting_user)
            .await?
            .ok_or_else(|| {
                EngineError::not_found(format!("no tenant membership for user {}", acting_user))
            })?;
        if !tenant.is_active() {
            return Err(EngineError::TenantSuspended(tenant.slug().to_string()));
        }

        let tenant_for_run = tenant.clone();
        self.connections
            .with_tenant(tenant_for_run, self.ingest(
                tenant,
                acting_user,
                campaign_slug,
                original_filename,
                mime_type,
                bytes,
            ))
            .await
    }

    async fn ingest(
        &self,
        tenant: Tenant,
        acting_user: UserId,
        campaign_slug: &str,
        original_filename: &str,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt, EngineError> {
        let campaign = self
            .campaigns
            .find_by_slug(campaign_slug)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("campaign '{}'", campaign_slug)))?;

        if campaign.state() != CampaignState::Active {
            return Err(EngineError::invalid_config(format!(
                "campaign '{}' is {} and does not accept uploads",
                campaign_slug,
                campaign.state().as_str()
            )));
        }
        if !campaign.accepts_mime_type(mime_type) {
            return Err(EngineError::invalid_config(format!(
                "mime type '{}' is not allowed by campaign '{}'",
                mime_type, campaign_slug
            )));
        }
        let size_bytes = bytes.len() as i64;
        if !campaign.accepts_file_size(size_bytes) {
            return Err(EngineError::invalid_config(format!(
                "file of {} bytes exceeds the campaign limit of {} bytes",
                size_bytes,
                campaign.max_file_size_bytes()
            )));
        }

        let sha256_hash = compute_sha256(bytes);

        // The storage path embeds the document id, so the entity is built
        // first and the coordinates are attached before the first persist.
        let document = Document::new(
            campaign.id(),
            original_filename.to_string(),
            mime_type.to_string(),
            size_bytes,
            sha256_hash,
            String::new(),
            self.storage.disk().to_string(),
        )?;
        let storage_path = document_storage_path(
            tenant.id(),
            document.id(),
            original_filename,
            chrono::Utc::now(),
        );
        let document = document.with_storage_path(storage_path.clone());

        self.storage.save(&storage_path, bytes).await?;
        self.documents.insert(&document).await?;

        let job = DocumentJob::new(document.id(), campaign.id(), campaign.snapshot_pipeline())?;
        self.jobs.insert(&job).await?;

        self.usage
            .append(
                &UsageEvent::new(UsageEventType::Upload, 1, 0.0)
                    .for_campaign(campaign.id())
                    .for_document(document.id())
                    .for_job(job.id()),
            )
            .await?;
        self.audit
            .append(
                &AuditEntry::new("document", document.id().to_string(), "uploaded")
                    .tagged("upload"),
            )
            .await?;

        // Queue step zero with both lifecycles moved to `queued`.
        self.documents
            .transition_state(document.id(), DocumentState::Pending, DocumentState::Queued)
            .await?;
        self.audit
            .append(&AuditEntry::state_transition(
                "document",
                document.id().to_string(),
                "pending",
                "queued",
            ))
            .await?;
        self.jobs
            .transition_state(job.id(), JobState::Pending, JobState::Queued)
            .await?;
        self.audit
            .append(&AuditEntry::state_transition(
                "document_job",
                job.id().to_string(),
                "pending",
                "queued",
            ))
            .await?;

        self.progress
            .upsert(&PipelineProgress::project(
                job.id(),
                job.step_count(),
                0,
                job.current_step().map(|step| step.id.clone()),
                JobState::Queued,
            ))
            .await?;

        self.dispatcher
            .dispatch(tenant.id(), job.id(), 0, 1)
            .await?;

        info!(
            tenant = %tenant.slug(),
            campaign = %campaign.slug(),
            document = %document.uuid(),
            user = %acting_user,
            size_bytes,
            "Document ingested and queued"
        );

        Ok(UploadReceipt {
            document_uuid: document.uuid(),
            job_uuid: job.uuid(),
        })
    }
}
