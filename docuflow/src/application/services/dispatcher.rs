// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Job Dispatcher & Worker
//!
//! The dispatcher serializes "next stage" units onto the durable queue with
//! tenant identity bound as a first-class payload field. The worker drains
//! the queue:
//!
//! 1. Claim a unit (conditional update - single-writer per unit).
//! 2. Resolve the tenant from the central catalog; suspended tenants get
//!    an audit entry and the unit is dropped.
//! 3. Honor the per-campaign concurrency limit via an in-memory token
//!    counter; over-limit units go back to the queue and wait.
//! 4. Rebind tenant context + handle and invoke the orchestrator.
//! 5. Ack, or nack with backoff on uncaught failure.
//!
//! The worker rebuilds nothing from memory across restarts: the registry
//! is re-discovered at boot and expired leases are reaped back into the
//! queue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use docuflow_bootstrap::shutdown::ShutdownToken;
use docuflow_domain::{AuditEntry, EngineError, JobId, TenantId, TenantStatus};

use crate::application::services::orchestrator::{Orchestrator, StepAdvance};
use crate::infrastructure::metrics::service::MetricsService;
use crate::infrastructure::queue::work_queue::{WorkQueue, WorkUnit};
use crate::infrastructure::tenancy::catalog::TenantCatalog;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

/// In-memory token counter bounding concurrent jobs per `(tenant,
/// campaign)`. Queue depth is unbounded; dispatch is what obeys the limit.
#[derive(Default)]
pub struct ConcurrencyLimiter {
    inflight: Mutex<HashMap<(String, String), i64>>,
}

impl ConcurrencyLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a token when under `limit`. Returns a guard that releases on
    /// drop, or `None` when the campaign is saturated.
    pub fn try_acquire(
        self: &Arc<Self>,
        tenant: &str,
        campaign: &str,
        limit: i64,
    ) -> Option<ConcurrencyPermit> {
        let key = (tenant.to_string(), campaign.to_string());
        let mut inflight = self.inflight.lock().ok()?;
        let count = inflight.entry(key.clone()).or_insert(0);
        if *count >= limit {
            return None;
        }
        *count += 1;
        Some(ConcurrencyPermit {
            limiter: Arc::clone(self),
            key,
        })
    }

    fn release(&self, key: &(String, String)) {
        if let Ok(mut inflight) = self.inflight.lock() {
            if let Some(count) = inflight.get_mut(key) {
                *count -= 1;
                if *count <= 0 {
                    inflight.remove(key);
                }
            }
        }
    }
}

/// RAII token from [`ConcurrencyLimiter::try_acquire`].
pub struct ConcurrencyPermit {
    limiter: Arc<ConcurrencyLimiter>,
    key: (String, String),
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        self.limiter.release(&self.key);
    }
}

/// Enqueues pipeline step units with tenant identity bound.
pub struct JobDispatcher {
    queue: Arc<WorkQueue>,
}

impl JobDispatcher {
    pub fn new(queue: Arc<WorkQueue>) -> Self {
        Self { queue }
    }

    /// Enqueues the given step of a job for immediate dispatch.
    pub async fn dispatch(
        &self,
        tenant_id: TenantId,
        job_id: JobId,
        step_index: i64,
        attempt: i64,
    ) -> Result<(), EngineError> {
        self.queue
            .enqueue(tenant_id, job_id, step_index, attempt, Duration::ZERO)
            .await
    }
}

/// Queue-draining worker that advances pipelines via the orchestrator.
pub struct Worker {
    queue: Arc<WorkQueue>,
    catalog: Arc<TenantCatalog>,
    connections: Arc<ConnectionManager>,
    orchestrator: Arc<Orchestrator>,
    limiter: Arc<ConcurrencyLimiter>,
    metrics: MetricsService,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        queue: Arc<WorkQueue>,
        catalog: Arc<TenantCatalog>,
        connections: Arc<ConnectionManager>,
        orchestrator: Arc<Orchestrator>,
        metrics: MetricsService,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            catalog,
            connections,
            orchestrator,
            limiter: Arc::new(ConcurrencyLimiter::new()),
            metrics,
            poll_interval,
        }
    }

    /// Drains the queue until the shutdown token fires. The in-flight unit
    /// is always finished before exit.
    pub async fn run(&self, shutdown: ShutdownToken) -> Result<(), EngineError> {
        info!("Worker started");
        loop {
            if shutdown.is_shutdown() {
                info!("Worker stopping on shutdown signal");
                return Ok(());
            }

            self.queue.reap_expired().await?;
            if let Ok(depth) = self.queue.depth().await {
                self.metrics.set_queue_depth(depth);
            }

            match self.queue.claim().await? {
                Some(unit) => {
                    if let Err(error) = self.process_unit(&unit).await {
                        error!(unit = unit.id, %error, "Work unit failed; nacking with backoff");
                        self.queue
                            .nack(
                                unit.id,
                                crate::infrastructure::queue::work_queue::backoff_delay(
                                    unit.attempt,
                                ),
                            )
                            .await?;
                    }
                }
                None => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = shutdown.wait() => {}
                    }
                }
            }
        }
    }

    /// Processes one claimed unit end to end.
    pub async fn process_unit(&self, unit: &WorkUnit) -> Result<StepAdvance, EngineError> {
        // Tenant identity travels with the unit; resolve it fresh from the
        // catalog so suspensions apply immediately.
        let Some(tenant) = self.catalog.find_by_id(unit.tenant_id).await? else {
            warn!(unit = unit.id, tenant = %unit.tenant_id, "Unit for unknown tenant; discarding");
            self.queue.discard(unit.id).await?;
            return Ok(StepAdvance::NoOp);
        };

        if tenant.status() == TenantStatus::Suspended || !tenant.is_active() {
            // Drop the unit with an audit entry in the tenant's own ledger.
            let audit_result = self
                .connections
                .with_tenant(tenant.clone(), async {
                    let audit = crate::infrastructure::repositories::SqliteAuditLedger::new(
                        self.connections.clone(),
                    );
                    docuflow_domain::repositories::AuditLedger::append(
                        &audit,
                        &AuditEntry::new("document_job", unit.job_id.to_string(), "unit_dropped")
                            .tagged("tenant_suspended"),
                    )
                    .await
                })
                .await;
            if let Err(error) = audit_result {
                warn!(%error, "Could not audit dropped unit for suspended tenant");
            }
            self.queue.discard(unit.id).await?;
            info!(tenant = %tenant.slug(), unit = unit.id, "Dropped unit for suspended tenant");
            return Ok(StepAdvance::NoOp);
        }

        // Per-campaign concurrency: load the campaign limit under the
        // tenant binding, then take a token.
        let (campaign_key, limit) = self.campaign_limit(&tenant, unit).await?;
        let Some(_permit) =
            self.limiter
                .try_acquire(&tenant.id().to_string(), &campaign_key, limit)
        else {
            debug!(unit = unit.id, "Campaign concurrency limit reached; requeueing");
            self.queue.nack(unit.id, Duration::from_secs(1)).await?;
            return Ok(StepAdvance::NoOp);
        };

        let advance = self
            .orchestrator
            .run_step(tenant, unit.job_id, unit.step_index, unit.attempt)
            .await?;
        self.queue.ack(unit.id).await?;
        Ok(advance)
    }

    /// Resolves `(campaign_id, max_concurrent_jobs)` for a unit's job.
    async fn campaign_limit(
        &self,
        tenant: &docuflow_domain::Tenant,
        unit: &WorkUnit,
    ) -> Result<(String, i64), EngineError> {
        self.connections
            .with_tenant(tenant.clone(), async {
                let jobs = crate::infrastructure::repositories::SqliteJobRepository::new(
                    self.connections.clone(),
                );
                let campaigns = crate::infrastructure::repositories::SqliteCampaignRepository::new(
                    self.connections.clone(),
                );
                let Some(job) =
                    docuflow_domain::repositories::JobRepository::find_by_id(&jobs, unit.job_id)
                        .await?
                else {
                    return Ok((String::new(), i64::MAX));
                };
                let campaign = docuflow_domain::repositories::CampaignRepository::find_by_id(
                    &campaigns,
                    job.campaign_id(),
                )
                .await?;
                Ok((
                    job.campaign_id().to_string(),
                    campaign
                        .map(|c| c.max_concurrent_jobs())
                        .unwrap_or(i64::MAX),
                ))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limiter_caps_and_releases() {
        let limiter = Arc::new(ConcurrencyLimiter::new());
        let first = limiter.try_acquire("t", "c", 2);
        let second = limiter.try_acquire("t", "c", 2);
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(limiter.try_acquire("t", "c", 2).is_none());

        // Other campaigns are unaffected.
        assert!(limiter.try_acquire("t", "other", 2).is_some());

        drop(first);
        assert!(limiter.try_acquire("t", "c", 2).is_some());
    }
}
