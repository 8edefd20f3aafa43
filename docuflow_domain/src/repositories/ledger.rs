// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Append-only ledger ports.
//!
//! Deliberately narrow: there is no update or delete on either trait, so
//! immutability is enforced at the repository layer by construction. The
//! tenant schema adds rejecting triggers as a database-level backstop.

use async_trait::async_trait;

use crate::entities::ledger::{AuditEntry, UsageEvent, UsageEventType};
use crate::error::EngineError;
use crate::value_objects::{DocumentId, JobId};

/// Usage metering ledger. Insert and read only.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    async fn append(&self, event: &UsageEvent) -> Result<(), EngineError>;

    async fn list_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<UsageEvent>, EngineError>;

    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<UsageEvent>, EngineError>;

    async fn count_by_type(&self, event_type: UsageEventType) -> Result<i64, EngineError>;
}

/// Immutable audit trail. Insert and read only.
#[async_trait]
pub trait AuditLedger: Send + Sync {
    async fn append(&self, entry: &AuditEntry) -> Result<(), EngineError>;

    async fn list_for(
        &self,
        auditable_type: &str,
        auditable_id: &str,
    ) -> Result<Vec<AuditEntry>, EngineError>;

    async fn count(&self) -> Result<i64, EngineError>;
}
