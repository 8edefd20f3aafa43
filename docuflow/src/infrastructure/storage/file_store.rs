// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Local Content Store
//!
//! Filesystem implementation of the content store port. Documents land at
//! `tenants/<tenant_id>/documents/<YYYY>/<MM>/<doc_id>_<original_filename>`
//! under the configured root, and each document records `(storage_disk,
//! storage_path)` so content location stays reproducible.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use docuflow_domain::services::ContentStore;
use docuflow_domain::{DocumentId, EngineError, TenantId};

/// Builds the canonical storage path for a document's content.
pub fn document_storage_path(
    tenant_id: TenantId,
    document_id: DocumentId,
    original_filename: &str,
    when: chrono::DateTime<chrono::Utc>,
) -> String {
    // Keep only filename-safe characters from the user-supplied name.
    let safe_name: String = original_filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "tenants/{}/documents/{}/{}_{}",
        tenant_id,
        when.format("%Y/%m"),
        document_id,
        safe_name
    )
}

/// Local-disk content store rooted at a configured directory.
pub struct LocalContentStore {
    root: PathBuf,
}

impl LocalContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, EngineError> {
        if path.split('/').any(|segment| segment == "..") || Path::new(path).is_absolute() {
            return Err(EngineError::storage_error(format!(
                "Refusing non-relative storage path '{}'",
                path
            )));
        }
        Ok(self.root.join(path))
    }
}

#[async_trait]
impl ContentStore for LocalContentStore {
    fn disk(&self) -> &str {
        "local"
    }

    async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::storage_error(format!("mkdir {}: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|e| EngineError::storage_error(format!("write {}: {}", full.display(), e)))
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, EngineError> {
        let full = self.resolve(path)?;
        tokio::fs::read(&full)
            .await
            .map_err(|e| EngineError::storage_error(format!("read {}: {}", full.display(), e)))
    }

    async fn exists(&self, path: &str) -> Result<bool, EngineError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_tenant_partitioned_and_month_bucketed() {
        let tenant_id = TenantId::new();
        let document_id = DocumentId::new();
        let when = chrono::DateTime::parse_from_rfc3339("2026-08-01T10:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let path = document_storage_path(tenant_id, document_id, "invoice #7.pdf", when);
        assert_eq!(
            path,
            format!("tenants/{tenant_id}/documents/2026/08/{document_id}_invoice__7.pdf")
        );
    }

    #[tokio::test]
    async fn round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new(dir.path());
        store.save("tenants/t/documents/2026/08/x.pdf", b"%PDF tiny").await.unwrap();
        assert!(store.exists("tenants/t/documents/2026/08/x.pdf").await.unwrap());
        let bytes = store.load("tenants/t/documents/2026/08/x.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF tiny");
    }

    #[tokio::test]
    async fn rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalContentStore::new(dir.path());
        assert!(store.load("../outside").await.is_err());
        assert!(store.save("/etc/passwd", b"nope").await.is_err());
    }
}
