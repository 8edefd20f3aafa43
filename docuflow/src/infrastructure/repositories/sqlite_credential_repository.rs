// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the credential repository. Rows hold only
//! ciphertext; the resolver decrypts at use sites.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::repositories::CredentialRepository;
use docuflow_domain::{Credential, CredentialId, CredentialScope, EngineError};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteCredentialRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteCredentialRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<Credential, EngineError> {
        Ok(Credential {
            id: row::parse_id(&r.get::<String, _>("id"))?,
            key: r.get("key"),
            encrypted_value: r.get("encrypted_value"),
            scope: CredentialScope::from_str(&r.get::<String, _>("scope"))?,
            scope_ref: r.get("scope_ref"),
            expires_at: row::parse_opt_ts(r.get("expires_at"))?,
            last_used_at: row::parse_opt_ts(r.get("last_used_at"))?,
            created_at: row::parse_ts(&r.get::<String, _>("created_at"))?,
            updated_at: row::parse_ts(&r.get::<String, _>("updated_at"))?,
            deleted_at: row::parse_opt_ts(r.get("deleted_at"))?,
        })
    }
}

#[async_trait]
impl CredentialRepository for SqliteCredentialRepository {
    async fn insert(&self, credential: &Credential) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("credential insert").await?;
        sqlx::query(
            "INSERT INTO credentials \
             (id, key, encrypted_value, scope, scope_ref, expires_at, last_used_at, \
              created_at, updated_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(credential.id.to_string())
        .bind(&credential.key)
        .bind(&credential.encrypted_value)
        .bind(credential.scope.as_str())
        .bind(&credential.scope_ref)
        .bind(row::fmt_opt_ts(credential.expires_at.as_ref()))
        .bind(row::fmt_opt_ts(credential.last_used_at.as_ref()))
        .bind(row::fmt_ts(&credential.created_at))
        .bind(row::fmt_ts(&credential.updated_at))
        .bind(row::fmt_opt_ts(credential.deleted_at.as_ref()))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("insert credential", e))?;
        Ok(())
    }

    async fn find(
        &self,
        key: &str,
        scope: CredentialScope,
        scope_ref: Option<&str>,
    ) -> Result<Option<Credential>, EngineError> {
        let pool = self.manager.tenant_pool("credential lookup").await?;
        let found = sqlx::query(
            "SELECT * FROM credentials WHERE key = ? AND scope = ? \
             AND ifnull(scope_ref, '') = ifnull(?, '') AND deleted_at IS NULL",
        )
        .bind(key)
        .bind(scope.as_str())
        .bind(scope_ref)
        .fetch_optional(&pool)
        .await
        .map_err(|e| row::db_err("find credential", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn touch_last_used(
        &self,
        id: CredentialId,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("credential touch").await?;
        sqlx::query("UPDATE credentials SET last_used_at = ? WHERE id = ?")
            .bind(row::fmt_ts(&at))
            .bind(id.to_string())
            .execute(&pool)
            .await
            .map_err(|e| row::db_err("touch credential", e))?;
        Ok(())
    }

    async fn rotate(&self, id: CredentialId, encrypted_value: &str) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("credential rotate").await?;
        sqlx::query("UPDATE credentials SET encrypted_value = ?, updated_at = ? WHERE id = ?")
            .bind(encrypted_value)
            .bind(row::fmt_ts(&chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&pool)
            .await
            .map_err(|e| row::db_err("rotate credential", e))?;
        Ok(())
    }

    async fn soft_delete(&self, id: CredentialId) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("credential delete").await?;
        sqlx::query("UPDATE credentials SET deleted_at = ? WHERE id = ?")
            .bind(row::fmt_ts(&chrono::Utc::now()))
            .bind(id.to_string())
            .execute(&pool)
            .await
            .map_err(|e| row::db_err("soft delete credential", e))?;
        Ok(())
    }
}
