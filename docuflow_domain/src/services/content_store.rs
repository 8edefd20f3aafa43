// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Content store port.
//!
//! Documents reference their content by `(storage_disk, storage_path)`; the
//! store resolves those coordinates to bytes. The canonical layout is
//! `tenants/<tenant_id>/documents/<YYYY>/<MM>/<doc_id>_<original_filename>`.

use async_trait::async_trait;

use crate::error::EngineError;

/// Persistent content storage for document payloads.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Identifier recorded as `storage_disk` on documents written here.
    fn disk(&self) -> &str;

    /// Stores bytes at the given relative path.
    async fn save(&self, path: &str, bytes: &[u8]) -> Result<(), EngineError>;

    /// Loads the bytes stored at the given relative path.
    async fn load(&self, path: &str) -> Result<Vec<u8>, EngineError>;

    /// Checks existence without reading.
    async fn exists(&self, path: &str) -> Result<bool, EngineError>;
}
