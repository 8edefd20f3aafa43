// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Progress projection port. One row per job, upserted alongside every
//! orchestrator transition and polled by the progress read model.

use async_trait::async_trait;

use crate::entities::ledger::PipelineProgress;
use crate::error::EngineError;
use crate::value_objects::JobId;

/// Persistence port for the pipeline progress projection.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn upsert(&self, progress: &PipelineProgress) -> Result<(), EngineError>;

    async fn find(&self, job_id: JobId) -> Result<Option<PipelineProgress>, EngineError>;
}
