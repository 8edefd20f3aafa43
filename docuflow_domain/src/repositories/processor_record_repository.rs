// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Processor record repository port. Backs the registry's lazy-load path
//! when a pipeline step references a slug discovered only in the tenant
//! database.

use async_trait::async_trait;

use crate::entities::processor_record::ProcessorRecord;
use crate::error::EngineError;

/// Persistence port for tenant-registered processor metadata.
#[async_trait]
pub trait ProcessorRecordRepository: Send + Sync {
    async fn upsert(&self, record: &ProcessorRecord) -> Result<(), EngineError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ProcessorRecord>, EngineError>;

    async fn list_active(&self) -> Result<Vec<ProcessorRecord>, EngineError>;
}
