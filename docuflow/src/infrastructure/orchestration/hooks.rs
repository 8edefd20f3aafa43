// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hook Manager
//!
//! Runs the observer chain around every processor execution. Hooks run in
//! registration order; a hook error is logged and swallowed - hooks observe
//! the pipeline, they never steer it.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use docuflow_domain::services::{ExecutionHook, TimeTrackingHook};
use docuflow_domain::ProcessorExecution;

use crate::infrastructure::metrics::service::MetricsService;

/// Ordered observer chain.
pub struct HookManager {
    hooks: Vec<Arc<dyn ExecutionHook>>,
}

impl HookManager {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// The default chain: time tracking first, then the metrics bridge.
    pub fn standard(metrics: MetricsService) -> Self {
        let mut manager = Self::new();
        manager.add(Arc::new(TimeTrackingHook));
        manager.add(Arc::new(MetricsHook { metrics }));
        manager
    }

    pub fn add(&mut self, hook: Arc<dyn ExecutionHook>) {
        self.hooks.push(hook);
    }

    pub async fn run_before(&self, execution: &mut ProcessorExecution) {
        for hook in &self.hooks {
            if let Err(error) = hook.before(execution).await {
                warn!(hook = hook.name(), %error, "before hook failed; continuing");
            }
        }
    }

    pub async fn run_after(&self, execution: &mut ProcessorExecution, output: &Value) {
        for hook in &self.hooks {
            if let Err(error) = hook.after(execution, output).await {
                warn!(hook = hook.name(), %error, "after hook failed; continuing");
            }
        }
    }

    pub async fn run_on_failure(&self, execution: &mut ProcessorExecution, message: &str) {
        for hook in &self.hooks {
            if let Err(error) = hook.on_failure(execution, message).await {
                warn!(hook = hook.name(), %error, "failure hook failed; continuing");
            }
        }
    }
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Bridges execution outcomes into the Prometheus registry.
struct MetricsHook {
    metrics: MetricsService,
}

#[async_trait::async_trait]
impl ExecutionHook for MetricsHook {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn after(
        &self,
        execution: &mut ProcessorExecution,
        _output: &Value,
    ) -> Result<(), docuflow_domain::EngineError> {
        self.metrics.record_execution(
            "completed",
            execution.processor_slug(),
            execution.duration_ms(),
        );
        Ok(())
    }

    async fn on_failure(
        &self,
        execution: &mut ProcessorExecution,
        _error: &str,
    ) -> Result<(), docuflow_domain::EngineError> {
        self.metrics.record_execution(
            "failed",
            execution.processor_slug(),
            execution.duration_ms(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docuflow_domain::{EngineError, JobId};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingHook {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExecutionHook for FailingHook {
        fn name(&self) -> &str {
            "failing"
        }

        async fn before(&self, _execution: &mut ProcessorExecution) -> Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(EngineError::internal_error("hook exploded"))
        }
    }

    struct CountingHook {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ExecutionHook for CountingHook {
        fn name(&self) -> &str {
            "counting"
        }

        async fn before(&self, _execution: &mut ProcessorExecution) -> Result<(), EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn a_failing_hook_does_not_stop_the_chain() {
        let failing_calls = Arc::new(AtomicUsize::new(0));
        let counting_calls = Arc::new(AtomicUsize::new(0));
        let mut manager = HookManager::new();
        manager.add(Arc::new(FailingHook {
            calls: failing_calls.clone(),
        }));
        manager.add(Arc::new(CountingHook {
            calls: counting_calls.clone(),
        }));

        let mut execution = ProcessorExecution::new_pending(
            JobId::new(),
            "ocr".into(),
            "ocr".into(),
            1,
            "digest".into(),
            json!({}),
        );
        manager.run_before(&mut execution).await;

        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
        assert_eq!(counting_calls.load(Ordering::SeqCst), 1);
    }
}
