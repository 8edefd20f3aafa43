// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Document Entity
//!
//! An ingested artifact subject to processing. The document carries its own
//! lifecycle (distinct from the job lifecycle), the content digest and
//! storage coordinates, a merged metadata map that processors extend through
//! `metadata_delta`, and an append-only `processing_history`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::state_machine::{self, DocumentState, ExecutionState, Machine};
use crate::value_objects::{CampaignId, DocumentId};

/// Hex-encoded SHA-256 digest of document content, as stored on the
/// `sha256_hash` field.
pub fn compute_sha256(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(bytes))
}

/// One entry of a document's processing history, appended after each
/// committed step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingHistoryEntry {
    pub step_id: String,
    pub processor_slug: String,
    pub state: ExecutionState,
    pub duration_ms: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
}

/// An uploaded document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    uuid: uuid::Uuid,
    campaign_id: CampaignId,
    original_filename: String,
    mime_type: String,
    size_bytes: i64,
    sha256_hash: String,
    storage_path: String,
    storage_disk: String,
    state: DocumentState,
    metadata: Value,
    processing_history: Vec<ProcessingHistoryEntry>,
    retries: i64,
    error_message: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Creates a pending document for an accepted upload.
    ///
    /// Campaign-level acceptance (mime type, size) is the upload action's
    /// responsibility; the entity only rejects structurally impossible
    /// values.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaign_id: CampaignId,
        original_filename: String,
        mime_type: String,
        size_bytes: i64,
        sha256_hash: String,
        storage_path: String,
        storage_disk: String,
    ) -> Result<Self, EngineError> {
        if original_filename.is_empty() {
            return Err(EngineError::invalid_config(
                "Document filename cannot be empty",
            ));
        }
        if size_bytes < 0 {
            return Err(EngineError::invalid_config(
                "Document size cannot be negative",
            ));
        }

        let now = chrono::Utc::now();

        Ok(Document {
            id: DocumentId::new(),
            uuid: uuid::Uuid::new_v4(),
            campaign_id,
            original_filename,
            mime_type,
            size_bytes,
            sha256_hash,
            storage_path,
            storage_disk,
            state: DocumentState::Pending,
            metadata: Value::Object(serde_json::Map::new()),
            processing_history: Vec::new(),
            retries: 0,
            error_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Sets the storage coordinates once the path (which embeds the
    /// document id) is known. Only meaningful before the first persist.
    pub fn with_storage_path(mut self, storage_path: String) -> Self {
        self.storage_path = storage_path;
        self
    }

    /// Rehydrates a document from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: DocumentId,
        uuid: uuid::Uuid,
        campaign_id: CampaignId,
        original_filename: String,
        mime_type: String,
        size_bytes: i64,
        sha256_hash: String,
        storage_path: String,
        storage_disk: String,
        state: DocumentState,
        metadata: Value,
        processing_history: Vec<ProcessingHistoryEntry>,
        retries: i64,
        error_message: Option<String>,
        created_at: chrono::DateTime<chrono::Utc>,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Document {
            id,
            uuid,
            campaign_id,
            original_filename,
            mime_type,
            size_bytes,
            sha256_hash,
            storage_path,
            storage_disk,
            state,
            metadata,
            processing_history,
            retries,
            error_message,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// Public handle exposed outside the engine.
    pub fn uuid(&self) -> uuid::Uuid {
        self.uuid
    }

    pub fn campaign_id(&self) -> CampaignId {
        self.campaign_id
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn size_bytes(&self) -> i64 {
        self.size_bytes
    }

    pub fn sha256_hash(&self) -> &str {
        &self.sha256_hash
    }

    pub fn storage_path(&self) -> &str {
        &self.storage_path
    }

    pub fn storage_disk(&self) -> &str {
        &self.storage_disk
    }

    pub fn state(&self) -> DocumentState {
        self.state
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn processing_history(&self) -> &[ProcessingHistoryEntry] {
        &self.processing_history
    }

    pub fn retries(&self) -> i64 {
        self.retries
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.created_at
    }

    pub fn updated_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.updated_at
    }

    /// Transitions the document, guarded by the state machine allow-list.
    pub fn transition_to(&mut self, to: DocumentState) -> Result<(), EngineError> {
        state_machine::ensure_transition(Machine::Document, self.state.as_str(), to.as_str())?;
        self.state = to;
        self.updated_at = chrono::Utc::now();
        Ok(())
    }

    /// Appends a history entry after a committed step.
    pub fn record_step(&mut self, entry: ProcessingHistoryEntry) {
        self.processing_history.push(entry);
        self.updated_at = chrono::Utc::now();
    }

    /// Merges a processor's metadata delta into the document metadata.
    /// Top-level keys from the delta overwrite existing keys.
    pub fn merge_metadata(&mut self, delta: &Value) {
        if let (Value::Object(current), Value::Object(incoming)) = (&mut self.metadata, delta) {
            for (key, value) in incoming {
                current.insert(key.clone(), value.clone());
            }
            self.updated_at = chrono::Utc::now();
        }
    }

    pub fn set_error_message(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
        self.updated_at = chrono::Utc::now();
    }

    pub fn increment_retries(&mut self) {
        self.retries += 1;
        self.updated_at = chrono::Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Document {
        Document::new(
            CampaignId::new(),
            "invoice.pdf".into(),
            "application/pdf".into(),
            17,
            "abc123".into(),
            "tenants/t/documents/2026/08/d_invoice.pdf".into(),
            "local".into(),
        )
        .unwrap()
    }

    #[test]
    fn lifecycle_happy_path() {
        let mut document = doc();
        assert_eq!(document.state(), DocumentState::Pending);
        document.transition_to(DocumentState::Queued).unwrap();
        document.transition_to(DocumentState::Processing).unwrap();
        document.transition_to(DocumentState::Completed).unwrap();
        assert!(document.state().is_terminal());
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut document = doc();
        let err = document.transition_to(DocumentState::Completed).unwrap_err();
        assert!(matches!(err, EngineError::StateTransitionRejected { .. }));
        // Entity state is untouched on rejection.
        assert_eq!(document.state(), DocumentState::Pending);
    }

    #[test]
    fn metadata_delta_overwrites_top_level_keys() {
        let mut document = doc();
        document.merge_metadata(&json!({"pages": 2, "lang": "eng"}));
        document.merge_metadata(&json!({"pages": 3}));
        assert_eq!(document.metadata()["pages"], 3);
        assert_eq!(document.metadata()["lang"], "eng");
    }
}
