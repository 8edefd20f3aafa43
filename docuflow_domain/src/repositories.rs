// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Repository ports (infrastructure boundaries).
//!
//! Every trait here is tenant-scoped except where a port explicitly belongs
//! to the central catalog; implementations resolve against the handle bound
//! by the tenant context and fail with `MissingTenantContext` when invoked
//! without a binding.

pub mod campaign_repository;
pub mod credential_repository;
pub mod document_repository;
pub mod execution_repository;
pub mod job_repository;
pub mod ledger;
pub mod processor_record_repository;
pub mod progress_repository;
pub mod validation_rule_repository;

pub use campaign_repository::CampaignRepository;
pub use credential_repository::CredentialRepository;
pub use document_repository::DocumentRepository;
pub use execution_repository::ExecutionRepository;
pub use job_repository::JobRepository;
pub use ledger::{AuditLedger, UsageLedger};
pub use processor_record_repository::ProcessorRecordRepository;
pub use progress_repository::ProgressRepository;
pub use validation_rule_repository::ValidationRuleRepository;
