// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Document job repository port.
//!
//! The guarded operations here are half of the single-writer discipline:
//! the durable queue hands a unit to one worker, and conditional updates at
//! this boundary ensure a racing duplicate can never commit a second
//! transition or move the cursor backwards.

use async_trait::async_trait;

use crate::entities::document_job::DocumentJob;
use crate::error::EngineError;
use crate::state_machine::JobState;
use crate::value_objects::{CampaignId, JobId};

/// Persistence port for document jobs.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn insert(&self, job: &DocumentJob) -> Result<(), EngineError>;

    /// Persists all mutable fields of an existing job.
    async fn save(&self, job: &DocumentJob) -> Result<(), EngineError>;

    async fn find_by_id(&self, id: JobId) -> Result<Option<DocumentJob>, EngineError>;

    async fn find_by_uuid(&self, uuid: uuid::Uuid) -> Result<Option<DocumentJob>, EngineError>;

    async fn find_by_document(
        &self,
        document_id: crate::value_objects::DocumentId,
    ) -> Result<Option<DocumentJob>, EngineError>;

    /// Conditionally transitions state. Returns `false` when the row was no
    /// longer in `from` (e.g. a concurrent cancellation won).
    async fn transition_state(
        &self,
        id: JobId,
        from: JobState,
        to: JobState,
    ) -> Result<bool, EngineError>;

    /// Advances `current_step_index` from the expected position by one and
    /// resets the attempt counter. Returns `false` when the cursor had
    /// already moved - the monotonicity guard.
    async fn advance_cursor(&self, id: JobId, from_index: i64) -> Result<bool, EngineError>;

    /// Number of jobs currently `queued` or `running` for a campaign. Used
    /// by the dispatcher to honor `max_concurrent_jobs`.
    async fn active_count_for_campaign(&self, campaign_id: CampaignId)
        -> Result<i64, EngineError>;
}
