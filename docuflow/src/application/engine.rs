// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Composition Root
//!
//! Wires configuration into the full service graph: connection manager,
//! catalog, repositories, registry with discovered built-ins, credential
//! resolution, queue, orchestrator, worker, and the use cases. The CLI and
//! the test suites both construct the engine through here so the wiring is
//! exercised end to end.

use std::sync::Arc;
use std::time::Duration;

use docuflow_domain::repositories::{
    AuditLedger, CampaignRepository, CredentialRepository, DocumentRepository,
    ExecutionRepository, JobRepository, ProcessorRecordRepository, ProgressRepository,
    UsageLedger, ValidationRuleRepository,
};
use docuflow_domain::services::HierarchicalCredentialResolver;
use docuflow_domain::{ContentStore, CredentialCipher, CredentialResolver, EngineError, EventPublisher};

use crate::application::services::dispatcher::{JobDispatcher, Worker};
use crate::application::services::orchestrator::Orchestrator;
use crate::application::services::upload::UploadService;
use crate::application::use_cases::import_campaign::CampaignImporter;
use crate::application::use_cases::provision_tenant::ProvisionTenant;
use crate::application::use_cases::read_models::DocumentReadModels;
use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::crypto::credential_cache::CachingCredentialResolver;
use crate::infrastructure::crypto::credential_cipher::AesGcmCredentialCipher;
use crate::infrastructure::events::TracingEventPublisher;
use crate::infrastructure::metrics::service::MetricsService;
use crate::infrastructure::orchestration::hooks::HookManager;
use crate::infrastructure::processors::install_builtin;
use crate::infrastructure::queue::work_queue::WorkQueue;
use crate::infrastructure::registry::processor_registry::ProcessorRegistry;
use crate::infrastructure::repositories::{
    SqliteAuditLedger, SqliteCampaignRepository, SqliteCredentialRepository,
    SqliteDocumentRepository, SqliteExecutionRepository, SqliteJobRepository,
    SqliteProcessorRecordRepository, SqliteProgressRepository, SqliteUsageLedger,
    SqliteValidationRuleRepository,
};
use crate::infrastructure::storage::file_store::LocalContentStore;
use crate::infrastructure::tenancy::catalog::TenantCatalog;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

/// The fully wired engine.
pub struct Engine {
    pub config: EngineConfig,
    pub connections: Arc<ConnectionManager>,
    pub catalog: Arc<TenantCatalog>,
    pub registry: Arc<ProcessorRegistry>,
    pub metrics: MetricsService,
    pub queue: Arc<WorkQueue>,
    pub storage: Arc<dyn ContentStore>,
    pub credentials: Arc<dyn CredentialResolver>,
    /// The TTL cache in front of the resolver; rotation invalidates here.
    pub credential_cache: Option<Arc<CachingCredentialResolver>>,
    pub credential_cipher: Option<Arc<dyn CredentialCipher>>,
    pub credential_repository: Arc<dyn CredentialRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub documents: Arc<dyn DocumentRepository>,
    pub jobs: Arc<dyn JobRepository>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub processor_records: Arc<dyn ProcessorRecordRepository>,
    pub validation_rules: Arc<dyn ValidationRuleRepository>,
    pub usage: Arc<dyn UsageLedger>,
    pub audit: Arc<dyn AuditLedger>,
    pub progress: Arc<dyn ProgressRepository>,
    pub events: Arc<dyn EventPublisher>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Engine {
    /// Builds the engine from configuration with the default event
    /// publisher.
    pub async fn build(config: EngineConfig) -> Result<Self, EngineError> {
        Self::build_with_events(config, Arc::new(TracingEventPublisher)).await
    }

    /// Builds the engine with a caller-supplied event publisher (tests use
    /// a collecting publisher).
    pub async fn build_with_events(
        config: EngineConfig,
        events: Arc<dyn EventPublisher>,
    ) -> Result<Self, EngineError> {
        let connections = Arc::new(ConnectionManager::connect(&config.data_dir).await?);
        let catalog = TenantCatalog::new(connections.central().clone());
        let metrics = MetricsService::new()?;
        let queue = Arc::new(
            WorkQueue::new(connections.central().clone())
                .with_lease(Duration::from_secs(config.worker.lease_secs)),
        );
        let storage: Arc<dyn ContentStore> =
            Arc::new(LocalContentStore::new(config.storage_root.clone()));

        let campaigns: Arc<dyn CampaignRepository> =
            Arc::new(SqliteCampaignRepository::new(connections.clone()));
        let documents: Arc<dyn DocumentRepository> =
            Arc::new(SqliteDocumentRepository::new(connections.clone()));
        let jobs: Arc<dyn JobRepository> = Arc::new(SqliteJobRepository::new(connections.clone()));
        let executions: Arc<dyn ExecutionRepository> =
            Arc::new(SqliteExecutionRepository::new(connections.clone()));
        let processor_records: Arc<dyn ProcessorRecordRepository> =
            Arc::new(SqliteProcessorRecordRepository::new(connections.clone()));
        let validation_rules: Arc<dyn ValidationRuleRepository> =
            Arc::new(SqliteValidationRuleRepository::new(connections.clone()));
        let usage: Arc<dyn UsageLedger> = Arc::new(SqliteUsageLedger::new(connections.clone()));
        let audit: Arc<dyn AuditLedger> = Arc::new(SqliteAuditLedger::new(connections.clone()));
        let progress: Arc<dyn ProgressRepository> =
            Arc::new(SqliteProgressRepository::new(connections.clone()));
        let credential_repository: Arc<dyn CredentialRepository> =
            Arc::new(SqliteCredentialRepository::new(connections.clone()));

        // Credential resolution needs a cipher; deployments without a key
        // can run pipelines whose processors declare no credentials.
        let credential_cipher: Option<Arc<dyn CredentialCipher>> = config
            .credential_key
            .as_deref()
            .map(AesGcmCredentialCipher::from_base64_key)
            .transpose()?
            .map(|cipher| Arc::new(cipher) as Arc<dyn CredentialCipher>);
        let (credentials, credential_cache): (
            Arc<dyn CredentialResolver>,
            Option<Arc<CachingCredentialResolver>>,
        ) = match &credential_cipher {
            Some(cipher) => {
                let resolver = Arc::new(HierarchicalCredentialResolver::new(
                    credential_repository.clone(),
                    cipher.clone(),
                ));
                let cache = Arc::new(CachingCredentialResolver::new(resolver));
                (cache.clone(), Some(cache))
            }
            None => (Arc::new(NoCredentialResolver), None),
        };

        // Discovery rebuilds the registry on every boot.
        let mut registry = ProcessorRegistry::new();
        install_builtin(&mut registry, validation_rules.clone());
        let registry = Arc::new(registry);

        let orchestrator = Arc::new(Orchestrator::new(
            connections.clone(),
            jobs.clone(),
            documents.clone(),
            executions.clone(),
            campaigns.clone(),
            processor_records.clone(),
            usage.clone(),
            audit.clone(),
            progress.clone(),
            registry.clone(),
            HookManager::standard(metrics.clone()),
            credentials.clone(),
            storage.clone(),
            queue.clone(),
            events.clone(),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            connections,
            catalog,
            registry,
            metrics,
            queue,
            storage,
            credentials,
            credential_cache,
            credential_cipher,
            credential_repository,
            campaigns,
            documents,
            jobs,
            executions,
            processor_records,
            validation_rules,
            usage,
            audit,
            progress,
            events,
            orchestrator,
        })
    }

    pub fn dispatcher(&self) -> JobDispatcher {
        JobDispatcher::new(self.queue.clone())
    }

    pub fn upload_service(&self) -> UploadService {
        UploadService::new(
            self.catalog.clone(),
            self.connections.clone(),
            self.campaigns.clone(),
            self.documents.clone(),
            self.jobs.clone(),
            self.usage.clone(),
            self.audit.clone(),
            self.progress.clone(),
            self.storage.clone(),
            self.dispatcher(),
        )
    }

    pub fn importer(&self) -> CampaignImporter {
        CampaignImporter::new(
            self.campaigns.clone(),
            self.processor_records.clone(),
            self.audit.clone(),
            self.registry.clone(),
        )
    }

    pub fn provisioner(&self) -> ProvisionTenant {
        ProvisionTenant::new(self.catalog.clone(), self.connections.clone(), self.audit.clone())
    }

    pub fn read_models(&self) -> DocumentReadModels {
        DocumentReadModels::new(
            self.documents.clone(),
            self.jobs.clone(),
            self.executions.clone(),
            self.progress.clone(),
            self.campaigns.clone(),
            self.registry.clone(),
        )
    }

    pub fn worker(&self) -> Worker {
        Worker::new(
            self.queue.clone(),
            self.catalog.clone(),
            self.connections.clone(),
            self.orchestrator.clone(),
            self.metrics.clone(),
            Duration::from_millis(self.config.worker.poll_interval_ms),
        )
    }
}

/// Resolver for deployments without a credential key: every lookup is
/// absent, so processors requiring credentials fail their jobs loudly.
struct NoCredentialResolver;

#[async_trait::async_trait]
impl CredentialResolver for NoCredentialResolver {
    async fn resolve(
        &self,
        _key: &str,
        _lookup: &docuflow_domain::CredentialLookup,
    ) -> Result<Option<String>, EngineError> {
        Ok(None)
    }
}
