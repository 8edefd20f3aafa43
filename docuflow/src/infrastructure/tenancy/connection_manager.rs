// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Connection Manager
//!
//! Maintains the cache of named database handles: the central catalog pool
//! and one pool per tenant, keyed `tenant_<id>`. The first time a tenant
//! database is bound, the physical file is created and the tenant schema is
//! applied before any query executes. A failed migration surfaces as
//! `TenantSchemaInitializationFailed` and the handle is not cached, so the
//! next acquisition retries from scratch.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use sqlx::SqlitePool;
use tokio::sync::RwLock;
use tracing::{info, warn};

use docuflow_domain::{EngineError, Tenant, TenantId};

use crate::infrastructure::repositories::schema;
use crate::infrastructure::tenancy::context::TenantContext;

/// Per-tenant database handle cache over a data directory of SQLite files.
pub struct ConnectionManager {
    data_dir: PathBuf,
    central: SqlitePool,
    tenants: RwLock<HashMap<String, SqlitePool>>,
}

impl ConnectionManager {
    /// Connects the central catalog, creating and migrating it if needed.
    pub async fn connect(data_dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let data_dir = data_dir.into();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(|e| EngineError::IoError(format!("Cannot create data dir: {}", e)))?;

        let central_url = format!("sqlite://{}/central.db", data_dir.display());
        schema::create_database_if_missing(&central_url)
            .await
            .map_err(|e| EngineError::database_error(format!("Central database: {}", e)))?;
        let central = SqlitePool::connect(&central_url)
            .await
            .map_err(|e| EngineError::database_error(format!("Central connect: {}", e)))?;
        schema::ensure_central_schema(&central)
            .await
            .map_err(|e| EngineError::database_error(format!("Central migrations: {}", e)))?;

        Ok(Self {
            data_dir,
            central,
            tenants: RwLock::new(HashMap::new()),
        })
    }

    /// The central catalog handle.
    pub fn central(&self) -> &SqlitePool {
        &self.central
    }

    fn tenant_database_url(&self, tenant: &Tenant) -> String {
        format!(
            "sqlite://{}/{}.db",
            self.data_dir.display(),
            tenant.database_name()
        )
    }

    /// Acquires the tenant handle, creating the physical database and
    /// applying tenant migrations on first bind. Idempotent; subsequent
    /// calls return the cached pool.
    pub async fn acquire(&self, tenant: &Tenant) -> Result<SqlitePool, EngineError> {
        let key = tenant.database_name();
        {
            let cache = self.tenants.read().await;
            if let Some(pool) = cache.get(&key) {
                return Ok(pool.clone());
            }
        }

        let url = self.tenant_database_url(tenant);
        schema::create_database_if_missing(&url).await.map_err(|e| {
            EngineError::TenantSchemaInitializationFailed(format!("{}: {}", key, e))
        })?;
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| EngineError::TenantSchemaInitializationFailed(format!("{}: {}", key, e)))?;

        if let Err(e) = schema::ensure_tenant_schema(&pool).await {
            // Not cached; the pool is closed and the next acquire retries.
            pool.close().await;
            warn!(tenant = %tenant.slug(), error = %e, "Tenant schema migration failed");
            return Err(EngineError::TenantSchemaInitializationFailed(format!(
                "{}: {}",
                key, e
            )));
        }

        let mut cache = self.tenants.write().await;
        let pool = cache.entry(key.clone()).or_insert(pool).clone();
        info!(tenant = %tenant.slug(), database = %key, "Tenant database bound");
        Ok(pool)
    }

    /// Drops a tenant handle from the cache; the pool closes once in-flight
    /// borrows finish.
    pub async fn release(&self, tenant_id: TenantId) {
        let key = format!("tenant_{}", tenant_id);
        if let Some(pool) = self.tenants.write().await.remove(&key) {
            pool.close().await;
            info!(database = %key, "Tenant database released");
        }
    }

    /// Resolves the pool for the current tenant binding. This is the choke
    /// point every tenant-scoped repository goes through: no binding, no
    /// data.
    pub async fn tenant_pool(&self, operation: &str) -> Result<SqlitePool, EngineError> {
        let tenant = TenantContext::require(operation)?;
        self.acquire(&tenant).await
    }

    /// Combines `TenantContext::run` with handle binding: the tenant
    /// database is migrated and cached before the closure runs under the
    /// binding.
    pub async fn with_tenant<F, T>(&self, tenant: Tenant, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        self.acquire(&tenant).await?;
        TenantContext::run(tenant, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(slug: &str) -> Tenant {
        Tenant::new(slug.into(), format!("{slug}@tenants.test")).unwrap()
    }

    #[tokio::test]
    async fn acquire_is_idempotent_and_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConnectionManager::connect(dir.path()).await.unwrap();
        let t = tenant("acme");

        let first = manager.acquire(&t).await.unwrap();
        let second = manager.acquire(&t).await.unwrap();
        assert_eq!(first.size(), second.size());

        let count: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='campaigns'",
        )
        .fetch_one(&first)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn tenant_pool_requires_a_binding() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConnectionManager::connect(dir.path()).await.unwrap();
        let err = manager.tenant_pool("campaign list").await.unwrap_err();
        assert!(matches!(err, EngineError::MissingTenantContext(_)));
    }

    #[tokio::test]
    async fn with_tenant_binds_context_and_handle() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConnectionManager::connect(dir.path()).await.unwrap();
        let t = tenant("acme");

        let slug = manager
            .with_tenant(t, async {
                Ok(TenantContext::require("test")?.slug().to_string())
            })
            .await
            .unwrap();
        assert_eq!(slug, "acme");
    }

    #[tokio::test]
    async fn distinct_tenants_get_distinct_databases() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConnectionManager::connect(dir.path()).await.unwrap();
        let a = tenant("alpha");
        let b = tenant("beta");
        manager.acquire(&a).await.unwrap();
        manager.acquire(&b).await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("tenant_") && name.ends_with(".db"))
            .collect();
        names.sort();
        assert_eq!(names.len(), 2);
    }
}
