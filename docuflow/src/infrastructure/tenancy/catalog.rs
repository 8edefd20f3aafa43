// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Catalog
//!
//! Central registry mapping tenant identity to physical database location
//! and status, plus the user/membership tables the upload action uses to
//! resolve a tenant from an authenticated caller. Lives in the central
//! database, never in a tenant database.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use tracing::info;

use docuflow_domain::entities::tenant::{MembershipRole, TenantDomain, User};
use docuflow_domain::{EngineError, Tenant, TenantId, TenantStatus, TenantTier, UserId};

use crate::infrastructure::repositories::row;

/// Central catalog over the shared `central.db` pool.
pub struct TenantCatalog {
    pool: SqlitePool,
}

impl TenantCatalog {
    pub fn new(pool: SqlitePool) -> Arc<Self> {
        Arc::new(Self { pool })
    }

    /// Inserts a provisioned tenant.
    pub async fn insert(&self, tenant: &Tenant) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO tenants \
             (id, slug, email, status, tier, settings, credentials, credit_balance, \
              trial_ends_at, created_at, updated_at, deleted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(tenant.id().to_string())
        .bind(tenant.slug())
        .bind(tenant.email())
        .bind(tenant.status().as_str())
        .bind(tenant.tier().as_str())
        .bind(row::to_json(tenant.settings())?)
        .bind(tenant.credentials())
        .bind(tenant.credit_balance())
        .bind(row::fmt_opt_ts(tenant.trial_ends_at()))
        .bind(row::fmt_ts(tenant.created_at()))
        .bind(row::fmt_ts(tenant.updated_at()))
        .bind(row::fmt_opt_ts(tenant.deleted_at()))
        .execute(&self.pool)
        .await
        .map_err(|e| row::db_err("insert tenant", e))?;

        info!(tenant = %tenant.slug(), "Tenant registered in catalog");
        Ok(())
    }

    /// Persists status and mutable fields of an existing tenant.
    pub async fn save(&self, tenant: &Tenant) -> Result<(), EngineError> {
        sqlx::query(
            "UPDATE tenants SET email = ?, status = ?, tier = ?, settings = ?, \
             credentials = ?, credit_balance = ?, trial_ends_at = ?, updated_at = ?, \
             deleted_at = ? WHERE id = ?",
        )
        .bind(tenant.email())
        .bind(tenant.status().as_str())
        .bind(tenant.tier().as_str())
        .bind(row::to_json(tenant.settings())?)
        .bind(tenant.credentials())
        .bind(tenant.credit_balance())
        .bind(row::fmt_opt_ts(tenant.trial_ends_at()))
        .bind(row::fmt_ts(tenant.updated_at()))
        .bind(row::fmt_opt_ts(tenant.deleted_at()))
        .bind(tenant.id().to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| row::db_err("save tenant", e))?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: TenantId) -> Result<Option<Tenant>, EngineError> {
        let found = sqlx::query("SELECT * FROM tenants WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| row::db_err("find tenant by id", e))?;
        found.map(|r| Self::map_tenant(&r)).transpose()
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, EngineError> {
        let found = sqlx::query("SELECT * FROM tenants WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| row::db_err("find tenant by slug", e))?;
        found.map(|r| Self::map_tenant(&r)).transpose()
    }

    /// Resolves tenant identity from an inbound request host.
    pub async fn find_by_host(&self, host: &str) -> Result<Option<Tenant>, EngineError> {
        let found = sqlx::query(
            "SELECT t.* FROM tenants t JOIN domains d ON d.tenant_id = t.id WHERE d.host = ?",
        )
        .bind(host)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| row::db_err("find tenant by host", e))?;
        found.map(|r| Self::map_tenant(&r)).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, EngineError> {
        let rows = sqlx::query("SELECT * FROM tenants WHERE deleted_at IS NULL ORDER BY created_at")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| row::db_err("list tenants", e))?;
        rows.iter().map(Self::map_tenant).collect()
    }

    /// Registers a domain for host-based tenant resolution.
    pub async fn add_domain(&self, domain: &TenantDomain) -> Result<(), EngineError> {
        sqlx::query("INSERT INTO domains (host, tenant_id, created_at) VALUES (?, ?, ?)")
            .bind(&domain.host)
            .bind(domain.tenant_id.to_string())
            .bind(row::fmt_ts(&domain.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| row::db_err("add domain", e))?;
        Ok(())
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), EngineError> {
        sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?, ?, ?)")
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(row::fmt_ts(&user.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| row::db_err("insert user", e))?;
        Ok(())
    }

    pub async fn add_membership(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        role: MembershipRole,
    ) -> Result<(), EngineError> {
        sqlx::query(
            "INSERT INTO memberships (user_id, tenant_id, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id.to_string())
        .bind(tenant_id.to_string())
        .bind(role.as_str())
        .bind(row::fmt_ts(&chrono::Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| row::db_err("add membership", e))?;
        Ok(())
    }

    /// Resolves the tenant an authenticated user acts under: the earliest
    /// membership wins. No membership means the caller cannot touch any
    /// tenant data.
    pub async fn resolve_tenant_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Option<Tenant>, EngineError> {
        let found = sqlx::query(
            "SELECT t.* FROM tenants t \
             JOIN memberships m ON m.tenant_id = t.id \
             WHERE m.user_id = ? ORDER BY m.created_at LIMIT 1",
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| row::db_err("resolve tenant for user", e))?;
        found.map(|r| Self::map_tenant(&r)).transpose()
    }

    fn map_tenant(r: &sqlx::sqlite::SqliteRow) -> Result<Tenant, EngineError> {
        Ok(Tenant::from_parts(
            row::parse_id(&r.get::<String, _>("id"))?,
            r.get("slug"),
            r.get("email"),
            TenantStatus::from_str(&r.get::<String, _>("status"))?,
            TenantTier::from_str(&r.get::<String, _>("tier"))?,
            row::parse_json(&r.get::<String, _>("settings"))?,
            r.get("credentials"),
            r.get("credit_balance"),
            row::parse_opt_ts(r.get("trial_ends_at"))?,
            row::parse_ts(&r.get::<String, _>("created_at"))?,
            row::parse_ts(&r.get::<String, _>("updated_at"))?,
            row::parse_opt_ts(r.get("deleted_at"))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::schema;

    async fn catalog() -> (tempfile::TempDir, Arc<TenantCatalog>) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/central.db", dir.path().display());
        schema::create_database_if_missing(&url).await.unwrap();
        let pool = SqlitePool::connect(&url).await.unwrap();
        schema::ensure_central_schema(&pool).await.unwrap();
        (dir, TenantCatalog::new(pool))
    }

    #[tokio::test]
    async fn round_trips_a_tenant() {
        let (_dir, catalog) = catalog().await;
        let tenant = Tenant::new("acme".into(), "ops@acme.test".into()).unwrap();
        catalog.insert(&tenant).await.unwrap();

        let loaded = catalog.find_by_slug("acme").await.unwrap().unwrap();
        assert_eq!(loaded.id(), tenant.id());
        assert_eq!(loaded.status(), TenantStatus::Active);
    }

    #[tokio::test]
    async fn resolves_tenant_from_membership() {
        let (_dir, catalog) = catalog().await;
        let tenant = Tenant::new("acme".into(), "ops@acme.test".into()).unwrap();
        catalog.insert(&tenant).await.unwrap();
        let user = User::new("user@acme.test".into());
        catalog.insert_user(&user).await.unwrap();
        catalog
            .add_membership(user.id, tenant.id(), MembershipRole::Owner)
            .await
            .unwrap();

        let resolved = catalog.resolve_tenant_for_user(user.id).await.unwrap().unwrap();
        assert_eq!(resolved.id(), tenant.id());

        let stranger = User::new("other@nowhere.test".into());
        catalog.insert_user(&stranger).await.unwrap();
        assert!(catalog
            .resolve_tenant_for_user(stranger.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn suspension_is_persisted() {
        let (_dir, catalog) = catalog().await;
        let mut tenant = Tenant::new("acme".into(), "ops@acme.test".into()).unwrap();
        catalog.insert(&tenant).await.unwrap();
        tenant.suspend();
        catalog.save(&tenant).await.unwrap();

        let loaded = catalog.find_by_id(tenant.id()).await.unwrap().unwrap();
        assert_eq!(loaded.status(), TenantStatus::Suspended);
    }
}
