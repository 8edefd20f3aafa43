// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Credential repository port. Values are stored and returned as ciphertext;
//! the resolver decrypts at use sites.

use async_trait::async_trait;

use crate::entities::credential::{Credential, CredentialScope};
use crate::error::EngineError;
use crate::value_objects::CredentialId;

/// Persistence port for scoped credentials.
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn insert(&self, credential: &Credential) -> Result<(), EngineError>;

    /// Exact `(key, scope, scope_ref)` lookup. Soft-deleted rows are not
    /// returned; expiry is the resolver's concern.
    async fn find(
        &self,
        key: &str,
        scope: CredentialScope,
        scope_ref: Option<&str>,
    ) -> Result<Option<Credential>, EngineError>;

    /// Stamps `last_used_at` after a successful resolution.
    async fn touch_last_used(
        &self,
        id: CredentialId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), EngineError>;

    /// Replaces the ciphertext (rotation). Callers invalidate caches.
    async fn rotate(&self, id: CredentialId, encrypted_value: &str) -> Result<(), EngineError>;

    /// Soft delete; the row remains for audit but never resolves again.
    async fn soft_delete(&self, id: CredentialId) -> Result<(), EngineError>;
}
