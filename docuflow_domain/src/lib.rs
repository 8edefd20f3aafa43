// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Docuflow Domain
//!
//! Pure domain layer for the docuflow document processing engine: the
//! business entities, value objects, state machines, events, domain
//! services, and the ports infrastructure must implement. No runtime, no
//! database, no logging framework - those belong to the `docuflow` crate.
//!
//! ## Core Concepts
//!
//! ### Tenancy
//! Every piece of processing data belongs to exactly one tenant, and each
//! tenant owns a physical database `tenant_<id>`. The domain expresses this
//! through tenant-scoped repository ports that infrastructure resolves
//! against the tenant binding; code without a binding fails with
//! `MissingTenantContext` instead of silently touching the wrong data.
//!
//! ### Campaigns and Pipelines
//! A campaign is a pipeline template: an ordered, validated list of
//! processor steps plus intake constraints. Starting a job freezes the
//! pipeline into a snapshot so campaign edits never mutate in-flight work.
//!
//! ### Processors
//! Heterogeneous processing units - OCR, classification, extraction,
//! validation, enrichment, notification - all satisfy one contract:
//! `id` / `describe` / `execute`. The orchestrator never knows more about a
//! step than the contract exposes.
//!
//! ### Lifecycles
//! Documents, jobs, and executions each advance through a formal state
//! machine with a static transition allow-list; illegal transitions are
//! rejected loudly at both the entity and persistence boundaries.
//!
//! ### Ledgers
//! Usage metering and the audit trail are append-only: the ports expose no
//! update or delete, and the schema backs that up with rejecting triggers.

pub mod entities;
pub mod error;
pub mod events;
pub mod repositories;
pub mod services;
pub mod state_machine;
pub mod value_objects;

// Re-export commonly used types at the crate root
pub use entities::{
    AuditEntry, Campaign, CampaignDraft, CampaignSettings, CampaignState, CampaignType,
    Credential, CredentialScope, CustomValidationRule, Document, DocumentJob, JobErrorEntry,
    PipelineConfig, PipelineProgress, PipelineStep, ProcessingHistoryEntry, ProcessorCategory,
    ProcessorExecution, ProcessorRecord, RuleType, Tenant, TenantDomain, TenantStatus,
    TenantTier, UsageEvent, UsageEventType, User,
};
pub use error::EngineError;
pub use events::{EngineEvent, EventPublisher, NullEventPublisher};
pub use services::{
    ContentStore, CredentialCipher, CredentialLookup, CredentialResolver, ExecutionHook,
    FailureKind, HierarchicalCredentialResolver, Processor, ProcessorContext,
    ProcessorDescriptor, ProcessorOutcome, TimeTrackingHook,
};
pub use state_machine::{DocumentState, ExecutionState, JobState, Machine};
pub use value_objects::{
    CampaignId, CredentialId, DocumentId, ExecutionId, JobId, ProcessorId, RuleId, TenantId,
    UserId,
};
