// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite schema helpers shared by repository implementations.
//!
//! Two embedded migration sets: the central catalog (tenants, domains,
//! users, work queue) and the per-tenant schema applied the first time a
//! tenant database is bound.

use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Central catalog migrations, embedded at compile time.
pub static CENTRAL_MIGRATOR: Migrator = sqlx::migrate!("migrations/central");

/// Per-tenant schema migrations, embedded at compile time.
pub static TENANT_MIGRATOR: Migrator = sqlx::migrate!("migrations/tenant");

/// Runs pending central migrations against the provided pool.
pub async fn ensure_central_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("Ensuring central schema is up to date");
    CENTRAL_MIGRATOR.run(pool).await?;
    info!("Central schema is up to date");
    Ok(())
}

/// Runs pending tenant migrations against the provided pool.
pub async fn ensure_tenant_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    debug!("Ensuring tenant schema is up to date");
    TENANT_MIGRATOR.run(pool).await?;
    Ok(())
}

/// Creates a new SQLite database file if it doesn't exist.
///
/// `SqlitePool::connect` fails on a missing file unless connect options ask
/// for creation, so callers run this before the first connect.
pub async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    if !sqlx::Sqlite::database_exists(database_url).await? {
        debug!("Database does not exist, creating: {}", database_url);
        sqlx::Sqlite::create_database(database_url).await?;
        info!("Created new SQLite database: {}", database_url);
    } else {
        debug!("Database already exists: {}", database_url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn scratch_pool(dir: &tempfile::TempDir, name: &str) -> SqlitePool {
        let url = format!("sqlite://{}/{}.db", dir.path().display(), name);
        create_database_if_missing(&url).await.unwrap();
        SqlitePool::connect(&url).await.unwrap()
    }

    #[tokio::test]
    async fn central_schema_creates_the_catalog_tables() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir, "central").await;
        ensure_central_schema(&pool).await.unwrap();

        let count: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('tenants', 'work_queue')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn tenant_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir, "tenant_x").await;
        ensure_tenant_schema(&pool).await.unwrap();
        ensure_tenant_schema(&pool).await.unwrap();

        let count: i32 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='document_jobs'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn ledger_triggers_reject_updates_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let pool = scratch_pool(&dir, "tenant_y").await;
        ensure_tenant_schema(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO audit_logs (id, auditable_type, auditable_id, event, tags, created_at) \
             VALUES ('a1', 'document', 'd1', 'created', '[]', '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let update = sqlx::query("UPDATE audit_logs SET event = 'tampered' WHERE id = 'a1'")
            .execute(&pool)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM audit_logs WHERE id = 'a1'")
            .execute(&pool)
            .await;
        assert!(delete.is_err());
    }
}
