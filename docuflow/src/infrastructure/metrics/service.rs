// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Prometheus-based metrics collection for engine observability: execution
//! outcomes and durations, retries, document terminal states, queue depth,
//! and in-flight jobs. Thread-safe and cheap to clone; one registry per
//! process.

use std::sync::Arc;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use docuflow_domain::EngineError;

/// Prometheus metrics for the document processing engine.
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    executions_total: IntCounterVec,
    execution_duration_seconds: Histogram,
    execution_retries_total: IntCounter,
    documents_completed_total: IntCounter,
    documents_failed_total: IntCounter,
    queue_depth: IntGauge,
    active_jobs: IntGauge,
}

impl MetricsService {
    pub fn new() -> Result<Self, EngineError> {
        let registry = Arc::new(Registry::new());

        let executions_total = IntCounterVec::new(
            Opts::new(
                "docuflow_executions_total",
                "Processor executions by terminal state",
            ),
            &["state", "processor"],
        )
        .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;

        let execution_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "docuflow_execution_duration_seconds",
                "Wall-clock duration of processor executions",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0]),
        )
        .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;

        let execution_retries_total = IntCounter::new(
            "docuflow_execution_retries_total",
            "Retriable step failures re-enqueued with backoff",
        )
        .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;

        let documents_completed_total = IntCounter::new(
            "docuflow_documents_completed_total",
            "Documents whose pipelines ran to completion",
        )
        .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;

        let documents_failed_total = IntCounter::new(
            "docuflow_documents_failed_total",
            "Documents whose pipelines failed terminally",
        )
        .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;

        let queue_depth = IntGauge::new(
            "docuflow_queue_depth",
            "Work units waiting in the durable queue",
        )
        .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;

        let active_jobs = IntGauge::new(
            "docuflow_active_jobs",
            "Jobs currently being advanced by workers",
        )
        .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;

        for collector in [
            Box::new(executions_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(execution_duration_seconds.clone()),
            Box::new(execution_retries_total.clone()),
            Box::new(documents_completed_total.clone()),
            Box::new(documents_failed_total.clone()),
            Box::new(queue_depth.clone()),
            Box::new(active_jobs.clone()),
        ] {
            registry
                .register(collector)
                .map_err(|e| EngineError::internal_error(format!("metrics: {}", e)))?;
        }

        Ok(Self {
            registry,
            executions_total,
            execution_duration_seconds,
            execution_retries_total,
            documents_completed_total,
            documents_failed_total,
            queue_depth,
            active_jobs,
        })
    }

    pub fn record_execution(&self, state: &str, processor: &str, duration_ms: i64) {
        self.executions_total
            .with_label_values(&[state, processor])
            .inc();
        self.execution_duration_seconds
            .observe(duration_ms as f64 / 1000.0);
    }

    pub fn record_retry(&self) {
        self.execution_retries_total.inc();
    }

    pub fn record_document_completed(&self) {
        self.documents_completed_total.inc();
    }

    pub fn record_document_failed(&self) {
        self.documents_failed_total.inc();
    }

    pub fn set_queue_depth(&self, depth: i64) {
        self.queue_depth.set(depth);
    }

    pub fn job_started(&self) {
        self.active_jobs.inc();
    }

    pub fn job_finished(&self) {
        self.active_jobs.dec();
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn export(&self) -> Result<String, EngineError> {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .map_err(|e| EngineError::internal_error(format!("metrics export: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_exports() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_execution("completed", "ocr", 120);
        metrics.record_execution("failed", "ocr", 40);
        metrics.record_retry();
        metrics.record_document_completed();
        metrics.set_queue_depth(3);

        let exported = metrics.export().unwrap();
        assert!(exported.contains("docuflow_executions_total"));
        assert!(exported.contains("docuflow_queue_depth 3"));
    }
}
