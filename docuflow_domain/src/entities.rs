// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain entities: tenancy catalog, campaigns, documents, jobs, processor
//! records and executions, credentials, validation rules, and the ledgers.

pub mod campaign;
pub mod credential;
pub mod custom_validation_rule;
pub mod document;
pub mod document_job;
pub mod ledger;
pub mod processor_execution;
pub mod processor_record;
pub mod tenant;

pub use campaign::{
    Campaign, CampaignDraft, CampaignSettings, CampaignState, CampaignType, ChecklistItem,
    PipelineConfig, PipelineStep,
};
pub use credential::{Credential, CredentialScope};
pub use custom_validation_rule::{CustomValidationRule, RuleType, DEFAULT_LOCALE};
pub use document::{Document, ProcessingHistoryEntry};
pub use document_job::{DocumentJob, JobErrorEntry, DEFAULT_MAX_ATTEMPTS};
pub use ledger::{AuditEntry, PipelineProgress, UsageEvent, UsageEventType};
pub use processor_execution::ProcessorExecution;
pub use processor_record::{ProcessorCategory, ProcessorRecord};
pub use tenant::{MembershipRole, Tenant, TenantDomain, TenantStatus, TenantTier, User};
