// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single hierarchical error type for the document processing engine.
//! Every failure the engine can surface is a variant of [`EngineError`],
//! categorized so callers can decide between retrying, failing the enclosing
//! job, or surfacing the problem to an operator.
//!
//! ## Error Categories
//!
//! - **Tenancy**: `MissingTenantContext`, `TenantSuspended`,
//!   `TenantSchemaInitializationFailed`
//! - **Pipeline**: `ProcessorNotRegistered`, `ProcessorExecutionFailure`,
//!   `OutputValidationFailure`, `CredentialNotFound`
//! - **State machines**: `StateTransitionRejected`
//! - **Importer**: `ImporterValidationError` with field-level detail
//! - **Infrastructure**: `DatabaseError`, `IoError`, `StorageError`,
//!   `SerializationError`, `TimeoutError`
//! - **Control flow**: `Cancelled`, `NotFound`, `InvalidConfiguration`,
//!   `InternalError`
//!
//! ## Retry Semantics
//!
//! Only failures for which [`EngineError::is_retriable`] returns `true` are
//! eligible for the orchestrator's bounded retry policy. Output validation
//! failures, unknown processors, and rejected state transitions are always
//! fatal for the enclosing job.

use thiserror::Error;

/// Domain-specific errors for the document processing engine.
///
/// Variants carry descriptive messages rather than source chains so they can
/// be cloned into job error logs and audit entries without losing fidelity.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Tenant-scoped code was invoked without a tenant binding. Fatal and
    /// surfaced immediately; never silently defaulted.
    #[error("Missing tenant context: {0}")]
    MissingTenantContext(String),

    /// A request or work unit touched a suspended tenant.
    #[error("Tenant suspended: {0}")]
    TenantSuspended(String),

    /// Tenant schema migration failed; the connection is not cached.
    #[error("Tenant schema initialization failed: {0}")]
    TenantSchemaInitializationFailed(String),

    /// A pipeline step references a processor slug the registry cannot
    /// resolve, even after the lazy database fallback.
    #[error("Processor not registered: {0}")]
    ProcessorNotRegistered(String),

    /// A processor reported a failure. `retriable` drives the retry policy.
    #[error("Processor execution failed: {message}")]
    ProcessorExecutionFailure { message: String, retriable: bool },

    /// Processor output violated its declared output schema. Non-retriable;
    /// fails the job to stop malformed data from propagating.
    #[error("Output validation failed: {0}")]
    OutputValidationFailure(String),

    /// A required credential was absent across all four scopes.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// An illegal state transition was attempted. Programming error;
    /// surfaced loudly and never swallowed.
    #[error("State transition rejected: {machine} {from} -> {to}")]
    StateTransitionRejected {
        machine: String,
        from: String,
        to: String,
    },

    /// A campaign definition failed validation. `field` is a path into the
    /// submitted document (e.g. `processors[1].id`).
    #[error("Campaign definition invalid at {field}: {reason}")]
    ImporterValidationError { field: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EngineError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new missing-tenant-context error
    pub fn missing_tenant_context(msg: impl Into<String>) -> Self {
        Self::MissingTenantContext(msg.into())
    }

    /// Creates a new database error
    pub fn database_error(msg: impl Into<String>) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Creates a new storage error
    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    /// Creates a processor failure that the retry policy may re-attempt
    pub fn retriable_failure(msg: impl Into<String>) -> Self {
        Self::ProcessorExecutionFailure {
            message: msg.into(),
            retriable: true,
        }
    }

    /// Creates a processor failure that fails the job without retries
    pub fn fatal_failure(msg: impl Into<String>) -> Self {
        Self::ProcessorExecutionFailure {
            message: msg.into(),
            retriable: false,
        }
    }

    /// Creates a field-level importer validation error
    pub fn importer_error(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImporterValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a rejected state transition error
    pub fn transition_rejected(
        machine: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::StateTransitionRejected {
            machine: machine.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Checks if the retry policy may re-attempt the failed operation.
    ///
    /// Timeouts, transient IO, and processor failures flagged `retriable`
    /// qualify; everything else fails the enclosing job.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            EngineError::TimeoutError(_)
                | EngineError::IoError(_)
                | EngineError::ProcessorExecutionFailure { retriable: true, .. }
        )
    }

    /// Gets the error category
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::MissingTenantContext(_) => "tenancy",
            EngineError::TenantSuspended(_) => "tenancy",
            EngineError::TenantSchemaInitializationFailed(_) => "tenancy",
            EngineError::ProcessorNotRegistered(_) => "pipeline",
            EngineError::ProcessorExecutionFailure { .. } => "pipeline",
            EngineError::OutputValidationFailure(_) => "validation",
            EngineError::CredentialNotFound(_) => "credential",
            EngineError::StateTransitionRejected { .. } => "state",
            EngineError::ImporterValidationError { .. } => "importer",
            EngineError::InvalidConfiguration(_) => "configuration",
            EngineError::NotFound(_) => "lookup",
            EngineError::DatabaseError(_) => "database",
            EngineError::SerializationError(_) => "serialization",
            EngineError::IoError(_) => "io",
            EngineError::StorageError(_) => "storage",
            EngineError::TimeoutError(_) => "timeout",
            EngineError::Cancelled(_) => "cancellation",
            EngineError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retriable_classification_follows_the_retry_policy() {
        assert!(EngineError::retriable_failure("transient").is_retriable());
        assert!(EngineError::TimeoutError("slow remote".into()).is_retriable());
        assert!(!EngineError::fatal_failure("bad input").is_retriable());
        assert!(!EngineError::OutputValidationFailure("path /total".into()).is_retriable());
        assert!(!EngineError::ProcessorNotRegistered("ocr".into()).is_retriable());
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(
            EngineError::missing_tenant_context("document lookup").category(),
            "tenancy"
        );
        assert_eq!(
            EngineError::transition_rejected("document", "completed", "pending").category(),
            "state"
        );
        assert_eq!(
            EngineError::importer_error("processors[1].id", "duplicate").category(),
            "importer"
        );
    }

    #[test]
    fn importer_error_keeps_field_detail() {
        let err = EngineError::importer_error("processors[1].id", "duplicate");
        match err {
            EngineError::ImporterValidationError { field, reason } => {
                assert_eq!(field, "processors[1].id");
                assert_eq!(reason, "duplicate");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
