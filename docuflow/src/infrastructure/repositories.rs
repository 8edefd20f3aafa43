// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite repository implementations over the tenant binding. Each
//! repository resolves its pool through the connection manager from the
//! current tenant context, so tenant isolation is enforced at the only
//! place data access happens.

pub mod row;
pub mod schema;
pub mod sqlite_campaign_repository;
pub mod sqlite_credential_repository;
pub mod sqlite_document_repository;
pub mod sqlite_execution_repository;
pub mod sqlite_job_repository;
pub mod sqlite_ledger;
pub mod sqlite_processor_record_repository;
pub mod sqlite_progress_repository;
pub mod sqlite_validation_rule_repository;

pub use sqlite_campaign_repository::SqliteCampaignRepository;
pub use sqlite_credential_repository::SqliteCredentialRepository;
pub use sqlite_document_repository::SqliteDocumentRepository;
pub use sqlite_execution_repository::SqliteExecutionRepository;
pub use sqlite_job_repository::SqliteJobRepository;
pub use sqlite_ledger::{SqliteAuditLedger, SqliteUsageLedger};
pub use sqlite_processor_record_repository::SqliteProcessorRecordRepository;
pub use sqlite_progress_repository::SqliteProgressRepository;
pub use sqlite_validation_rule_repository::SqliteValidationRuleRepository;
