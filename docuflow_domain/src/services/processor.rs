// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Contract
//!
//! The uniform interface every processing unit satisfies, whether it is a
//! local OCR pass, a remote AI call, a validator, or a notifier. The
//! orchestrator only ever speaks this contract; heterogeneity lives behind
//! it.
//!
//! ## Contract
//!
//! - `id()` - stable lowercase registry slug
//! - `describe()` - name, category, config schema, optional output schema,
//!   per-invocation timeout, and declared credential requirements
//! - `execute(ctx)` - run against a [`ProcessorContext`] and report a
//!   [`ProcessorOutcome`]
//!
//! A processor reports business failures through `ProcessorOutcome::Failure`
//! with an explicit `retriable` flag; `Err(EngineError)` from `execute` is
//! reserved for infrastructure trouble and is treated as retriable by the
//! orchestrator.
//!
//! ## Thread Safety
//!
//! Implementations must be `Send + Sync`; a single processor instance is
//! shared across concurrent executions and must not hold per-invocation
//! state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::entities::campaign::{Campaign, PipelineStep};
use crate::entities::document::Document;
use crate::entities::processor_record::ProcessorCategory;
use crate::error::EngineError;
use crate::services::content_store::ContentStore;
use crate::services::credential_resolver::CredentialResolver;

/// Default per-invocation timeout when a processor does not declare one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Static description of a processor implementation.
#[derive(Debug, Clone)]
pub struct ProcessorDescriptor {
    pub name: String,
    pub category: ProcessorCategory,
    /// JSON Schema the step `config` is validated against by the importer.
    pub config_schema: Value,
    /// JSON Schema the processor's output must satisfy before a step
    /// commits. Absent means output is accepted as-is.
    pub output_schema: Option<Value>,
    /// Per-invocation timeout enforced locally by the worker.
    pub timeout: Duration,
    /// Credential keys the processor needs at runtime. Missing required
    /// credentials fail the job; optional ones resolve to `None`.
    pub required_credentials: Vec<String>,
    pub optional_credentials: Vec<String>,
}

impl ProcessorDescriptor {
    pub fn new(name: impl Into<String>, category: ProcessorCategory, config_schema: Value) -> Self {
        ProcessorDescriptor {
            name: name.into(),
            category,
            config_schema,
            output_schema: None,
            timeout: DEFAULT_TIMEOUT,
            required_credentials: Vec::new(),
            optional_credentials: Vec::new(),
        }
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_required_credential(mut self, key: impl Into<String>) -> Self {
        self.required_credentials.push(key.into());
        self
    }

    pub fn with_optional_credential(mut self, key: impl Into<String>) -> Self {
        self.optional_credentials.push(key.into());
        self
    }
}

/// Classified failure reported by a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Execution,
    Timeout,
    MissingCredential,
    InvalidInput,
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Execution => "execution",
            FailureKind::Timeout => "timeout",
            FailureKind::MissingCredential => "missing_credential",
            FailureKind::InvalidInput => "invalid_input",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

/// Result of one processor invocation.
#[derive(Debug, Clone)]
pub enum ProcessorOutcome {
    Success {
        /// Structured output committed onto the execution row and exposed to
        /// downstream steps via `prior_outputs`.
        output: Value,
        tokens_used: i64,
        cost_credits: f64,
        /// Top-level keys merged into the document metadata.
        metadata_delta: Value,
    },
    Failure {
        kind: FailureKind,
        message: String,
        retriable: bool,
    },
}

impl ProcessorOutcome {
    /// Success with output only, no metering and no metadata delta.
    pub fn success(output: Value) -> Self {
        ProcessorOutcome::Success {
            output,
            tokens_used: 0,
            cost_credits: 0.0,
            metadata_delta: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>, retriable: bool) -> Self {
        ProcessorOutcome::Failure {
            kind,
            message: message.into(),
            retriable,
        }
    }
}

/// Everything a processor may touch during one invocation.
///
/// The context is assembled by the orchestrator under the tenant binding;
/// processors never reach around it to global state.
#[derive(Clone)]
pub struct ProcessorContext {
    pub document: Document,
    pub campaign: Campaign,
    pub step: PipelineStep,
    /// Committed outputs of earlier steps, keyed by step id, in order.
    pub prior_outputs: BTreeMap<String, Value>,
    pub credentials: Arc<dyn CredentialResolver>,
    pub storage: Arc<dyn ContentStore>,
}

impl ProcessorContext {
    /// The step configuration, always an object per campaign validation.
    pub fn config(&self) -> &Value {
        &self.step.config
    }

    /// Reads a string setting from the step configuration.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.step.config.get(key).and_then(Value::as_str)
    }

    /// Loads the document content from the store.
    pub async fn document_bytes(&self) -> Result<Vec<u8>, EngineError> {
        self.storage.load(self.document.storage_path()).await
    }
}

/// The pluggable processing unit contract.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Stable lowercase registry slug.
    fn id(&self) -> &str;

    /// Static description: name, category, schemas, timeout, credentials.
    fn describe(&self) -> ProcessorDescriptor;

    /// Executes against the context. Business failures are reported through
    /// `ProcessorOutcome::Failure`; `Err` is infrastructure trouble.
    async fn execute(&self, ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_builder_accumulates_credentials() {
        let descriptor = ProcessorDescriptor::new("OCR", ProcessorCategory::Ocr, json!({}))
            .with_required_credential("ocr_api_key")
            .with_optional_credential("ocr_region")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(descriptor.required_credentials, vec!["ocr_api_key"]);
        assert_eq!(descriptor.optional_credentials, vec!["ocr_region"]);
        assert_eq!(descriptor.timeout, Duration::from_secs(5));
        assert!(descriptor.output_schema.is_none());
    }

    #[test]
    fn bare_success_has_no_metering() {
        match ProcessorOutcome::success(json!({"ok": true})) {
            ProcessorOutcome::Success {
                tokens_used,
                cost_credits,
                metadata_delta,
                ..
            } => {
                assert_eq!(tokens_used, 0);
                assert_eq!(cost_credits, 0.0);
                assert_eq!(metadata_delta, json!({}));
            }
            ProcessorOutcome::Failure { .. } => panic!("expected success"),
        }
    }
}
