// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Execution Hooks
//!
//! Observer chain invoked around every processor execution. Hooks run in
//! registration order; a hook error is caught and logged by the manager and
//! must never interrupt the pipeline. Hooks only see the execution handle
//! they are passed - this is an observer list, not a cyclic graph.

use async_trait::async_trait;
use serde_json::Value;

use crate::entities::processor_execution::ProcessorExecution;
use crate::error::EngineError;

/// Observer invoked before, after, or on failure of a processor execution.
#[async_trait]
pub trait ExecutionHook: Send + Sync {
    /// Registration name, used in log lines when a hook misbehaves.
    fn name(&self) -> &str;

    async fn before(&self, _execution: &mut ProcessorExecution) -> Result<(), EngineError> {
        Ok(())
    }

    async fn after(
        &self,
        _execution: &mut ProcessorExecution,
        _output: &Value,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    async fn on_failure(
        &self,
        _execution: &mut ProcessorExecution,
        _error: &str,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Baseline hook: stamps `started_at` and computes `duration_ms` when the
/// execution finishes either way.
pub struct TimeTrackingHook;

impl TimeTrackingHook {
    fn record_duration(execution: &mut ProcessorExecution) {
        if let Some(started) = execution.started_at() {
            let elapsed = chrono::Utc::now().signed_duration_since(*started);
            execution.set_duration_ms(elapsed.num_milliseconds());
        }
    }
}

#[async_trait]
impl ExecutionHook for TimeTrackingHook {
    fn name(&self) -> &str {
        "time_tracking"
    }

    async fn before(&self, execution: &mut ProcessorExecution) -> Result<(), EngineError> {
        execution.mark_started(chrono::Utc::now());
        Ok(())
    }

    async fn after(
        &self,
        execution: &mut ProcessorExecution,
        _output: &Value,
    ) -> Result<(), EngineError> {
        Self::record_duration(execution);
        Ok(())
    }

    async fn on_failure(
        &self,
        execution: &mut ProcessorExecution,
        _error: &str,
    ) -> Result<(), EngineError> {
        Self::record_duration(execution);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::JobId;
    use serde_json::json;

    #[test]
    fn time_tracking_stamps_start_and_duration() {
        futures::executor::block_on(async {
            let mut execution = ProcessorExecution::new_pending(
                JobId::new(),
                "ocr".into(),
                "ocr".into(),
                1,
                "digest".into(),
                json!({}),
            );
            let hook = TimeTrackingHook;
            hook.before(&mut execution).await.unwrap();
            assert!(execution.started_at().is_some());
            hook.after(&mut execution, &json!({})).await.unwrap();
            assert!(execution.duration_ms() >= 0);
        });
    }
}
