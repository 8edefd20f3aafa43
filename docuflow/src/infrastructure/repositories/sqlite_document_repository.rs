// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the document repository.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::entities::document::ProcessingHistoryEntry;
use docuflow_domain::repositories::DocumentRepository;
use docuflow_domain::{Document, DocumentId, DocumentState, EngineError};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteDocumentRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteDocumentRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<Document, EngineError> {
        let history: Vec<ProcessingHistoryEntry> =
            row::parse_json(&r.get::<String, _>("processing_history"))?;
        Ok(Document::from_parts(
            row::parse_id(&r.get::<String, _>("id"))?,
            row::parse_uuid(&r.get::<String, _>("uuid"))?,
            row::parse_id(&r.get::<String, _>("campaign_id"))?,
            r.get("original_filename"),
            r.get("mime_type"),
            r.get("size_bytes"),
            r.get("sha256_hash"),
            r.get("storage_path"),
            r.get("storage_disk"),
            DocumentState::from_str(&r.get::<String, _>("state"))?,
            row::parse_json(&r.get::<String, _>("metadata"))?,
            history,
            r.get("retries"),
            r.get("error_message"),
            row::parse_ts(&r.get::<String, _>("created_at"))?,
            row::parse_ts(&r.get::<String, _>("updated_at"))?,
        ))
    }
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn insert(&self, document: &Document) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("document insert").await?;
        sqlx::query(
            "INSERT INTO documents \
             (id, uuid, campaign_id, original_filename, mime_type, size_bytes, sha256_hash, \
              storage_path, storage_disk, state, metadata, processing_history, retries, \
              error_message, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(document.id().to_string())
        .bind(document.uuid().to_string())
        .bind(document.campaign_id().to_string())
        .bind(document.original_filename())
        .bind(document.mime_type())
        .bind(document.size_bytes())
        .bind(document.sha256_hash())
        .bind(document.storage_path())
        .bind(document.storage_disk())
        .bind(document.state().as_str())
        .bind(row::to_json(document.metadata())?)
        .bind(row::to_json(&document.processing_history())?)
        .bind(document.retries())
        .bind(document.error_message())
        .bind(row::fmt_ts(document.created_at()))
        .bind(row::fmt_ts(document.updated_at()))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("insert document", e))?;
        Ok(())
    }

    async fn save(&self, document: &Document) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("document save").await?;
        sqlx::query(
            "UPDATE documents SET state = ?, metadata = ?, processing_history = ?, \
             retries = ?, error_message = ?, updated_at = ? WHERE id = ?",
        )
        .bind(document.state().as_str())
        .bind(row::to_json(document.metadata())?)
        .bind(row::to_json(&document.processing_history())?)
        .bind(document.retries())
        .bind(document.error_message())
        .bind(row::fmt_ts(document.updated_at()))
        .bind(document.id().to_string())
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("save document", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, EngineError> {
        let pool = self.manager.tenant_pool("document lookup").await?;
        let found = sqlx::query("SELECT * FROM documents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find document by id", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn find_by_uuid(&self, uuid: uuid::Uuid) -> Result<Option<Document>, EngineError> {
        let pool = self.manager.tenant_pool("document lookup").await?;
        let found = sqlx::query("SELECT * FROM documents WHERE uuid = ?")
            .bind(uuid.to_string())
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find document by uuid", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn transition_state(
        &self,
        id: DocumentId,
        from: DocumentState,
        to: DocumentState,
    ) -> Result<bool, EngineError> {
        // Legality is checked before the write; the conditional update only
        // guards against a concurrent transition winning the race.
        docuflow_domain::state_machine::ensure_transition(
            docuflow_domain::Machine::Document,
            from.as_str(),
            to.as_str(),
        )?;
        let pool = self.manager.tenant_pool("document transition").await?;
        let result = sqlx::query(
            "UPDATE documents SET state = ?, updated_at = ? WHERE id = ? AND state = ?",
        )
        .bind(to.as_str())
        .bind(row::fmt_ts(&chrono::Utc::now()))
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("document transition", e))?;
        Ok(result.rows_affected() == 1)
    }
}
