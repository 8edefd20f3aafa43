// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the processor record repository.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::repositories::ProcessorRecordRepository;
use docuflow_domain::{EngineError, ProcessorCategory, ProcessorRecord};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteProcessorRecordRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteProcessorRecordRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<ProcessorRecord, EngineError> {
        Ok(ProcessorRecord {
            id: row::parse_id(&r.get::<String, _>("id"))?,
            slug: r.get("slug"),
            name: r.get("name"),
            category: ProcessorCategory::from_str(&r.get::<String, _>("category"))?,
            class_ref: r.get("class_ref"),
            config_schema: row::parse_json(&r.get::<String, _>("config_schema"))?,
            version: r.get("version"),
            is_system: r.get("is_system"),
            active: r.get("active"),
            created_at: row::parse_ts(&r.get::<String, _>("created_at"))?,
        })
    }
}

#[async_trait]
impl ProcessorRecordRepository for SqliteProcessorRecordRepository {
    async fn upsert(&self, record: &ProcessorRecord) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("processor upsert").await?;
        sqlx::query(
            "INSERT INTO processors \
             (id, slug, name, category, class_ref, config_schema, version, is_system, active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (slug) DO UPDATE SET \
               name = excluded.name, \
               category = excluded.category, \
               class_ref = excluded.class_ref, \
               config_schema = excluded.config_schema, \
               version = excluded.version, \
               active = excluded.active",
        )
        .bind(record.id.to_string())
        .bind(&record.slug)
        .bind(&record.name)
        .bind(record.category.as_str())
        .bind(&record.class_ref)
        .bind(row::to_json(&record.config_schema)?)
        .bind(&record.version)
        .bind(record.is_system)
        .bind(record.active)
        .bind(row::fmt_ts(&record.created_at))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("upsert processor", e))?;
        Ok(())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<ProcessorRecord>, EngineError> {
        let pool = self.manager.tenant_pool("processor lookup").await?;
        let found = sqlx::query("SELECT * FROM processors WHERE slug = ? AND active = 1")
            .bind(slug)
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find processor", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn list_active(&self) -> Result<Vec<ProcessorRecord>, EngineError> {
        let pool = self.manager.tenant_pool("processor list").await?;
        let rows = sqlx::query("SELECT * FROM processors WHERE active = 1 ORDER BY slug")
            .fetch_all(&pool)
            .await
            .map_err(|e| row::db_err("list processors", e))?;
        rows.iter().map(Self::map).collect()
    }
}
