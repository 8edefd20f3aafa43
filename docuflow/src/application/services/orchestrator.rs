// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Orchestrator
//!
//! The stateful engine that advances a document job through its pipeline
//! snapshot, one step per invocation. The orchestrator owns the job state
//! machine; the queue worker hands it `(tenant, job_id, step_index,
//! attempt)` and it does the rest:
//!
//! 1. Rehydrate the tenant binding and handle.
//! 2. Load the job; terminal or stale units degrade to no-ops.
//! 3. Move the job to `running` (idempotent when already running).
//! 4. Resolve the step's processor - registry first, then the lazy
//!    tenant-record fallback, then `ProcessorNotRegistered` fails the job.
//! 5. Create the execution under the `(job_id, step_id, attempt)`
//!    idempotency key; a duplicate key means a previous invocation already
//!    ran this unit and the outcome is reconciled instead of re-executed.
//! 6. Run hooks, execute with the processor's declared timeout, validate
//!    output against the declared schema, and commit.
//! 7. Meter usage, append audit entries, refresh the progress projection,
//!    and either enqueue the next step, schedule a retry with backoff, or
//!    terminalize the job and document.
//!
//! ## Ordering and idempotence
//!
//! A step's output is durably committed before the next unit is enqueued,
//! so within a job, steps observe strictly sequential, committed state.
//! Every state change goes through a conditional update; two workers
//! racing the same unit resolve to exactly one commit and one no-op.
//!
//! ## Cancellation
//!
//! Cancellation is observed at persistence boundaries: after the processor
//! returns, the job is reloaded and a cancelled job discards the result,
//! recording the in-flight execution as failed with a cancellation kind.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use docuflow_domain::repositories::{
    AuditLedger, CampaignRepository, DocumentRepository, ExecutionRepository, JobRepository,
    ProcessorRecordRepository, ProgressRepository, UsageLedger,
};
use docuflow_domain::services::{
    CredentialLookup, CredentialResolver, ProcessorContext, ProcessorOutcome,
};
use docuflow_domain::{
    AuditEntry, ContentStore, Document, DocumentJob, DocumentState, EngineError, EngineEvent,
    EventPublisher, ExecutionState, FailureKind, JobErrorEntry, JobId, JobState,
    PipelineProgress, ProcessingHistoryEntry, Processor, ProcessorExecution, Tenant, TenantId,
    UsageEvent, UsageEventType,
};

use crate::infrastructure::metrics::service::MetricsService;
use crate::infrastructure::orchestration::hooks::HookManager;
use crate::infrastructure::queue::work_queue::{backoff_delay, WorkQueue};
use crate::infrastructure::registry::processor_registry::ProcessorRegistry;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;
use crate::infrastructure::validation::output_validator;

/// What one orchestrator invocation did with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAdvance {
    /// Step committed; the next unit is enqueued.
    StepCompleted,
    /// The whole pipeline finished; job and document are `completed`.
    JobCompleted,
    /// Retriable failure; a retry unit is enqueued with backoff.
    Retrying,
    /// Fatal failure; job and document are `failed`.
    JobFailed,
    /// The job was cancelled; the result was discarded.
    Cancelled,
    /// Stale or duplicate unit; nothing to do.
    NoOp,
}

/// The per-job pipeline engine.
pub struct Orchestrator {
    connections: Arc<ConnectionManager>,
    jobs: Arc<dyn JobRepository>,
    documents: Arc<dyn DocumentRepository>,
    executions: Arc<dyn ExecutionRepository>,
    campaigns: Arc<dyn CampaignRepository>,
    processor_records: Arc<dyn ProcessorRecordRepository>,
    usage: Arc<dyn UsageLedger>,
    audit: Arc<dyn AuditLedger>,
    progress: Arc<dyn ProgressRepository>,
    registry: Arc<ProcessorRegistry>,
    hooks: HookManager,
    credentials: Arc<dyn CredentialResolver>,
    storage: Arc<dyn ContentStore>,
    queue: Arc<WorkQueue>,
    events: Arc<dyn EventPublisher>,
    metrics: MetricsService,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connections: Arc<ConnectionManager>,
        jobs: Arc<dyn JobRepository>,
        documents: Arc<dyn DocumentRepository>,
        executions: Arc<dyn ExecutionRepository>,
        campaigns: Arc<dyn CampaignRepository>,
        processor_records: Arc<dyn ProcessorRecordRepository>,
        usage: Arc<dyn UsageLedger>,
        audit: Arc<dyn AuditLedger>,
        progress: Arc<dyn ProgressRepository>,
        registry: Arc<ProcessorRegistry>,
        hooks: HookManager,
        credentials: Arc<dyn CredentialResolver>,
        storage: Arc<dyn ContentStore>,
        queue: Arc<WorkQueue>,
        events: Arc<dyn EventPublisher>,
        metrics: MetricsService,
    ) -> Self {
        Self {
            connections,
            jobs,
            documents,
            executions,
            campaigns,
            processor_records,
            usage,
            audit,
            progress,
            registry,
            hooks,
            credentials,
            storage,
            queue,
            events,
            metrics,
        }
    }

    /// Runs one step unit under the tenant binding.
    pub async fn run_step(
        &self,
        tenant: Tenant,
        job_id: JobId,
        step_index: i64,
        attempt: i64,
    ) -> Result<StepAdvance, EngineError> {
        let tenant_id = tenant.id();
        self.connections
            .with_tenant(tenant, self.advance(tenant_id, job_id, step_index, attempt))
            .await
    }

    async fn advance(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        step_index: i64,
        attempt: i64,
    ) -> Result<StepAdvance, EngineError> {
        self.metrics.job_started();
        let result = self
            .advance_inner(tenant_id, job_id, step_index, attempt)
            .await;
        self.metrics.job_finished();
        result
    }

    async fn advance_inner(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        step_index: i64,
        attempt: i64,
    ) -> Result<StepAdvance, EngineError> {
        let Some(mut job) = self.jobs.find_by_id(job_id).await? else {
            return Err(EngineError::not_found(format!("job {}", job_id)));
        };

        if job.state().is_terminal() {
            return Ok(StepAdvance::NoOp);
        }
        // A unit for a position the cursor already passed is a duplicate
        // delivery; the cursor never moves backwards.
        if step_index != job.current_step_index() {
            return Ok(StepAdvance::NoOp);
        }

        self.mark_running(&mut job).await?;

        let Some(step) = job.current_step().cloned() else {
            return Ok(StepAdvance::NoOp);
        };

        let Some(mut document) = self.documents.find_by_id(job.document_id()).await? else {
            return Err(EngineError::not_found(format!(
                "document {}",
                job.document_id()
            )));
        };
        if document.state() == DocumentState::Queued {
            self.transition_document(&mut document, DocumentState::Processing)
                .await?;
        }

        // Step 5: resolve the processor, falling back to the tenant's
        // processors table for lazily-registered slugs.
        let processor = match self.resolve_processor(&step.processor_type).await? {
            Some(processor) => processor,
            None => {
                let message = format!(
                    "step '{}' references unregistered processor '{}'",
                    step.id, step.processor_type
                );
                self.fail_job(&mut job, &mut document, &step.id, attempt, "pipeline", &message)
                    .await?;
                return Ok(StepAdvance::JobFailed);
            }
        };
        let descriptor = processor.describe();

        // Step 6: execution creation under the idempotency key.
        let mut execution = ProcessorExecution::new_pending(
            job.id(),
            processor.id().to_string(),
            step.id.clone(),
            attempt,
            document.sha256_hash().to_string(),
            step.config.clone(),
        );
        if !self.executions.insert_pending(&execution).await? {
            return self
                .reconcile_duplicate(&mut job, &mut document, &step.id, step_index, attempt, tenant_id)
                .await;
        }

        // Steps 7–8: hooks, running transition, execution with timeout.
        self.hooks.run_before(&mut execution).await;
        execution.begin()?;
        if !self
            .executions
            .transition_state(execution.id(), ExecutionState::Pending, ExecutionState::Running)
            .await?
        {
            // Another worker owns this execution.
            return Ok(StepAdvance::NoOp);
        }
        self.executions.save(&execution).await?;
        self.audit_transition("processor_execution", &execution.id().to_string(), "pending", "running")
            .await?;

        let Some(campaign) = self.campaigns.find_by_id(job.campaign_id()).await? else {
            return Err(EngineError::not_found(format!(
                "campaign {}",
                job.campaign_id()
            )));
        };

        let outcome = match self
            .preflight_credentials(&descriptor.required_credentials, processor.id(), &campaign, tenant_id)
            .await?
        {
            Some(message) => ProcessorOutcome::failure(FailureKind::MissingCredential, message, false),
            None => {
                let ctx = ProcessorContext {
                    document: document.clone(),
                    campaign: campaign.clone(),
                    step: step.clone(),
                    prior_outputs: self.prior_outputs(job.id()).await?,
                    credentials: self.credentials.clone(),
                    storage: self.storage.clone(),
                };
                match tokio::time::timeout(descriptor.timeout, processor.execute(&ctx)).await {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(error)) => {
                        let retriable = error.is_retriable()
                            || matches!(
                                error,
                                EngineError::DatabaseError(_) | EngineError::StorageError(_)
                            );
                        ProcessorOutcome::failure(
                            FailureKind::Execution,
                            error.to_string(),
                            retriable,
                        )
                    }
                    Err(_) => ProcessorOutcome::failure(
                        FailureKind::Timeout,
                        format!(
                            "processor '{}' exceeded its {}s timeout",
                            processor.id(),
                            descriptor.timeout.as_secs()
                        ),
                        true,
                    ),
                }
            }
        };

        // Cancellation boundary: a cancel that landed while the processor
        // ran wins over the result.
        if let Some(current) = self.jobs.find_by_id(job.id()).await? {
            if current.state() == JobState::Cancelled {
                execution.set_duration_ms(0);
                self.hooks.run_on_failure(&mut execution, "job cancelled").await;
                execution.fail("cancelled before commit")?;
                self.executions.save(&execution).await?;
                self.audit_transition(
                    "processor_execution",
                    &execution.id().to_string(),
                    "running",
                    "failed",
                )
                .await?;
                return Ok(StepAdvance::Cancelled);
            }
        }

        match outcome {
            ProcessorOutcome::Success {
                output,
                tokens_used,
                cost_credits,
                metadata_delta,
            } => {
                if let Some(schema) = &descriptor.output_schema {
                    if let Err(error) = output_validator::validate_output(schema, &output) {
                        let message = error.to_string();
                        self.hooks.run_on_failure(&mut execution, &message).await;
                        self.commit_execution_failure(&mut execution, &message).await?;
                        self.fail_job(
                            &mut job,
                            &mut document,
                            &step.id,
                            attempt,
                            "validation",
                            &message,
                        )
                        .await?;
                        return Ok(StepAdvance::JobFailed);
                    }
                }

                self.hooks.run_after(&mut execution, &output).await;
                self.commit_success(
                    &mut job,
                    &mut document,
                    &mut execution,
                    &step.id,
                    step_index,
                    output,
                    tokens_used,
                    cost_credits,
                    metadata_delta,
                    tenant_id,
                )
                .await
            }
            ProcessorOutcome::Failure {
                kind,
                message,
                retriable,
            } => {
                self.hooks.run_on_failure(&mut execution, &message).await;
                self.commit_execution_failure(&mut execution, &message).await?;

                job.record_attempt();
                job.append_error(JobErrorEntry {
                    step_id: step.id.clone(),
                    attempt,
                    kind: kind.as_str().to_string(),
                    message: message.clone(),
                    occurred_at: chrono::Utc::now(),
                });
                self.jobs.save(&job).await?;

                if retriable && job.has_attempts_remaining() {
                    let delay = backoff_delay(attempt);
                    self.metrics.record_retry();
                    info!(
                        job = %job.id(),
                        step = %step.id,
                        attempt,
                        delay_secs = delay.as_secs(),
                        "Retriable step failure; re-enqueueing with backoff"
                    );
                    self.queue
                        .enqueue(tenant_id, job.id(), step_index, attempt + 1, delay)
                        .await?;
                    self.update_progress(&job).await?;
                    Ok(StepAdvance::Retrying)
                } else {
                    self.fail_job(&mut job, &mut document, &step.id, attempt, kind.as_str(), &message)
                        .await?;
                    Ok(StepAdvance::JobFailed)
                }
            }
        }
    }

    /// Idempotent `queued/pending -> running` with the conditional update
    /// as the racing guard.
    async fn mark_running(&self, job: &mut DocumentJob) -> Result<(), EngineError> {
        match job.state() {
            JobState::Running => Ok(()),
            JobState::Pending => {
                // Direct invocation without a dispatch step.
                self.jobs
                    .transition_state(job.id(), JobState::Pending, JobState::Queued)
                    .await?;
                self.audit_transition("document_job", &job.id().to_string(), "pending", "queued")
                    .await?;
                if self
                    .jobs
                    .transition_state(job.id(), JobState::Queued, JobState::Running)
                    .await?
                {
                    self.audit_transition("document_job", &job.id().to_string(), "queued", "running")
                        .await?;
                }
                job.transition_to(JobState::Queued)?;
                job.transition_to(JobState::Running)?;
                self.update_progress(job).await?;
                Ok(())
            }
            JobState::Queued => {
                if self
                    .jobs
                    .transition_state(job.id(), JobState::Queued, JobState::Running)
                    .await?
                {
                    self.audit_transition("document_job", &job.id().to_string(), "queued", "running")
                        .await?;
                }
                job.transition_to(JobState::Running)?;
                self.update_progress(job).await?;
                Ok(())
            }
            other => Err(EngineError::transition_rejected(
                "job",
                other.as_str(),
                "running",
            )),
        }
    }

    async fn resolve_processor(
        &self,
        slug: &str,
    ) -> Result<Option<Arc<dyn Processor>>, EngineError> {
        if let Some(processor) = self.registry.resolve(slug) {
            return Ok(Some(processor));
        }
        if let Some(record) = self.processor_records.find_by_slug(slug).await? {
            match self.registry.register_from_record(&record) {
                Ok(()) => return Ok(self.registry.resolve(slug)),
                Err(error) => {
                    warn!(slug, %error, "Lazy processor registration failed");
                    return Ok(None);
                }
            }
        }
        Ok(None)
    }

    /// Resolves required credentials before execution. Returns the failure
    /// message when one is missing.
    async fn preflight_credentials(
        &self,
        required: &[String],
        processor_slug: &str,
        campaign: &docuflow_domain::Campaign,
        tenant_id: TenantId,
    ) -> Result<Option<String>, EngineError> {
        for key in required {
            let lookup = CredentialLookup::new()
                .for_processor(processor_slug)
                .for_campaign(campaign.id())
                .for_tenant(tenant_id);
            if self.credentials.resolve(key, &lookup).await?.is_none() {
                return Ok(Some(format!(
                    "required credential '{}' not found in any scope",
                    key
                )));
            }
        }
        Ok(None)
    }

    /// Committed outputs of earlier steps, keyed by step id.
    async fn prior_outputs(&self, job_id: JobId) -> Result<BTreeMap<String, Value>, EngineError> {
        let mut outputs = BTreeMap::new();
        for execution in self.executions.list_for_job(job_id).await? {
            if execution.state() == ExecutionState::Completed {
                if let Some(output) = execution.output() {
                    outputs.insert(execution.step_id().to_string(), output.clone());
                }
            }
        }
        Ok(outputs)
    }

    /// A duplicate `(job_id, step_id, attempt)` insertion: a previous
    /// invocation already handled this unit. Reconcile to its outcome.
    async fn reconcile_duplicate(
        &self,
        job: &mut DocumentJob,
        document: &mut Document,
        step_id: &str,
        step_index: i64,
        attempt: i64,
        tenant_id: TenantId,
    ) -> Result<StepAdvance, EngineError> {
        let Some(existing) = self.executions.find(job.id(), step_id, attempt).await? else {
            return Ok(StepAdvance::NoOp);
        };
        match existing.state() {
            // Completed but the cursor may not have advanced (crash between
            // commit and advance): push the cursor forward, do not re-meter.
            ExecutionState::Completed => {
                if self.jobs.advance_cursor(job.id(), step_index).await? {
                    job.advance_step();
                    if job.is_past_final_step() {
                        self.complete_job(job, document).await?;
                        return Ok(StepAdvance::JobCompleted);
                    }
                    self.queue
                        .enqueue(tenant_id, job.id(), step_index + 1, 1, std::time::Duration::ZERO)
                        .await?;
                    return Ok(StepAdvance::StepCompleted);
                }
                Ok(StepAdvance::NoOp)
            }
            // This attempt already failed; its retry or terminal handling
            // already happened.
            ExecutionState::Failed | ExecutionState::Skipped => Ok(StepAdvance::NoOp),
            // In-flight elsewhere.
            ExecutionState::Pending | ExecutionState::Running => Ok(StepAdvance::NoOp),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn commit_success(
        &self,
        job: &mut DocumentJob,
        document: &mut Document,
        execution: &mut ProcessorExecution,
        step_id: &str,
        step_index: i64,
        output: Value,
        tokens_used: i64,
        cost_credits: f64,
        metadata_delta: Value,
        tenant_id: TenantId,
    ) -> Result<StepAdvance, EngineError> {
        // Exactly one of two racing completions flips running -> completed.
        if !self
            .executions
            .transition_state(execution.id(), ExecutionState::Running, ExecutionState::Completed)
            .await?
        {
            return Ok(StepAdvance::NoOp);
        }
        execution.complete(output, tokens_used, cost_credits)?;
        self.executions.save(execution).await?;
        self.audit_transition(
            "processor_execution",
            &execution.id().to_string(),
            "running",
            "completed",
        )
        .await?;

        document.record_step(ProcessingHistoryEntry {
            step_id: step_id.to_string(),
            processor_slug: execution.processor_slug().to_string(),
            state: ExecutionState::Completed,
            duration_ms: execution.duration_ms(),
            completed_at: chrono::Utc::now(),
        });
        document.merge_metadata(&metadata_delta);
        self.documents.save(document).await?;

        self.usage
            .append(
                &UsageEvent::new(UsageEventType::ProcessorExecution, 1, cost_credits)
                    .for_campaign(job.campaign_id())
                    .for_document(document.id())
                    .for_job(job.id()),
            )
            .await?;
        if tokens_used > 0 {
            self.usage
                .append(
                    &UsageEvent::new(UsageEventType::AiTask, tokens_used, 0.0)
                        .for_campaign(job.campaign_id())
                        .for_document(document.id())
                        .for_job(job.id()),
                )
                .await?;
        }

        if !self.jobs.advance_cursor(job.id(), step_index).await? {
            // A racing invocation advanced first; everything above was
            // keyed and idempotent.
            return Ok(StepAdvance::NoOp);
        }
        job.advance_step();

        if job.is_past_final_step() {
            self.complete_job(job, document).await?;
            Ok(StepAdvance::JobCompleted)
        } else {
            self.update_progress(job).await?;
            self.events.publish(&EngineEvent::StepCompleted {
                tenant_id,
                job_id: job.id(),
                step_id: step_id.to_string(),
                step_index,
                stage_count: job.step_count(),
            });
            self.queue
                .enqueue(
                    tenant_id,
                    job.id(),
                    step_index + 1,
                    1,
                    std::time::Duration::ZERO,
                )
                .await?;
            Ok(StepAdvance::StepCompleted)
        }
    }

    async fn commit_execution_failure(
        &self,
        execution: &mut ProcessorExecution,
        message: &str,
    ) -> Result<(), EngineError> {
        if self
            .executions
            .transition_state(execution.id(), ExecutionState::Running, ExecutionState::Failed)
            .await?
        {
            execution.fail(message)?;
            self.executions.save(execution).await?;
            self.audit_transition(
                "processor_execution",
                &execution.id().to_string(),
                "running",
                "failed",
            )
            .await?;
        }
        Ok(())
    }

    async fn complete_job(
        &self,
        job: &mut DocumentJob,
        document: &mut Document,
    ) -> Result<(), EngineError> {
        if self
            .jobs
            .transition_state(job.id(), JobState::Running, JobState::Completed)
            .await?
        {
            self.audit_transition("document_job", &job.id().to_string(), "running", "completed")
                .await?;
        }
        job.transition_to(JobState::Completed)?;
        self.transition_document(document, DocumentState::Completed)
            .await?;
        self.update_progress(job).await?;
        self.metrics.record_document_completed();

        let tenant = crate::infrastructure::tenancy::context::TenantContext::require(
            "orchestrator completion",
        )?;
        self.events.publish(&EngineEvent::DocumentCompleted {
            tenant_id: tenant.id(),
            document_id: document.id(),
            job_id: job.id(),
        });
        info!(job = %job.id(), document = %document.id(), "Pipeline completed");
        Ok(())
    }

    /// Terminal failure path: execution is already failed; transition the
    /// job and document, project, audit, meter, and emit.
    async fn fail_job(
        &self,
        job: &mut DocumentJob,
        document: &mut Document,
        step_id: &str,
        attempt: i64,
        kind: &str,
        message: &str,
    ) -> Result<(), EngineError> {
        if job
            .error_log()
            .last()
            .map(|entry| entry.attempt != attempt || entry.step_id != step_id)
            .unwrap_or(true)
        {
            job.append_error(JobErrorEntry {
                step_id: step_id.to_string(),
                attempt,
                kind: kind.to_string(),
                message: message.to_string(),
                occurred_at: chrono::Utc::now(),
            });
        }

        let from = job.state();
        if from == JobState::Running {
            if self
                .jobs
                .transition_state(job.id(), JobState::Running, JobState::Failed)
                .await?
            {
                self.audit_transition("document_job", &job.id().to_string(), "running", "failed")
                    .await?;
            }
            job.transition_to(JobState::Failed)?;
        } else if from == JobState::Failed {
            // Idempotent re-fail on retry exhaustion; appends, never
            // overwrites.
            self.jobs
                .transition_state(job.id(), JobState::Failed, JobState::Failed)
                .await?;
            self.audit_transition("document_job", &job.id().to_string(), "failed", "failed")
                .await?;
        }
        self.jobs.save(job).await?;

        document.set_error_message(message);
        if document.state() == DocumentState::Processing {
            self.transition_document(document, DocumentState::Failed)
                .await?;
        } else {
            self.documents.save(document).await?;
        }
        self.update_progress(job).await?;
        self.metrics.record_document_failed();

        let tenant = crate::infrastructure::tenancy::context::TenantContext::require(
            "orchestrator failure",
        )?;
        self.events.publish(&EngineEvent::DocumentFailed {
            tenant_id: tenant.id(),
            document_id: document.id(),
            job_id: job.id(),
            message: message.to_string(),
        });
        warn!(job = %job.id(), step = step_id, kind, "Pipeline failed: {}", message);
        Ok(())
    }

    async fn transition_document(
        &self,
        document: &mut Document,
        to: DocumentState,
    ) -> Result<(), EngineError> {
        let from = document.state();
        document.transition_to(to)?;
        self.documents.save(document).await?;
        self.audit_transition(
            "document",
            &document.id().to_string(),
            from.as_str(),
            to.as_str(),
        )
        .await?;
        Ok(())
    }

    async fn update_progress(&self, job: &DocumentJob) -> Result<(), EngineError> {
        let current_stage_name = job.current_step().map(|step| step.id.clone());
        let progress = PipelineProgress::project(
            job.id(),
            job.step_count(),
            job.current_step_index().min(job.step_count()),
            current_stage_name,
            job.state(),
        );
        self.progress.upsert(&progress).await
    }

    async fn audit_transition(
        &self,
        auditable_type: &str,
        auditable_id: &str,
        from: &str,
        to: &str,
    ) -> Result<(), EngineError> {
        self.audit
            .append(&AuditEntry::state_transition(
                auditable_type,
                auditable_id,
                from,
                to,
            ))
            .await
    }
}
