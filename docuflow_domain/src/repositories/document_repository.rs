// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Document repository port.

use async_trait::async_trait;

use crate::entities::document::Document;
use crate::error::EngineError;
use crate::state_machine::DocumentState;
use crate::value_objects::DocumentId;

/// Persistence port for documents.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn insert(&self, document: &Document) -> Result<(), EngineError>;

    /// Persists all mutable fields of an existing document.
    async fn save(&self, document: &Document) -> Result<(), EngineError>;

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, EngineError>;

    /// Lookup by the public UUID handle.
    async fn find_by_uuid(&self, uuid: uuid::Uuid) -> Result<Option<Document>, EngineError>;

    /// Conditionally transitions state with a guarded update. Returns
    /// `false` when the row was no longer in `from` - the caller reloads
    /// and re-evaluates rather than overwriting a concurrent transition.
    async fn transition_state(
        &self,
        id: DocumentId,
        from: DocumentState,
        to: DocumentState,
    ) -> Result<bool, EngineError>;
}
