// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementations of the append-only ledgers.
//!
//! Neither implementation issues an UPDATE or DELETE, ever; the traits do
//! not offer one and the schema triggers reject them at the database level.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::repositories::{AuditLedger, UsageLedger};
use docuflow_domain::{AuditEntry, DocumentId, EngineError, JobId, UsageEvent, UsageEventType};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteUsageLedger {
    manager: Arc<ConnectionManager>,
}

impl SqliteUsageLedger {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<UsageEvent, EngineError> {
        Ok(UsageEvent {
            id: row::parse_id(&r.get::<String, _>("id"))?,
            event_type: UsageEventType::from_str(&r.get::<String, _>("event_type"))?,
            units: r.get("units"),
            cost_credits: r.get("cost_credits"),
            campaign_id: r
                .get::<Option<String>, _>("campaign_id")
                .as_deref()
                .map(row::parse_id)
                .transpose()?,
            document_id: r
                .get::<Option<String>, _>("document_id")
                .as_deref()
                .map(row::parse_id)
                .transpose()?,
            job_id: r
                .get::<Option<String>, _>("job_id")
                .as_deref()
                .map(row::parse_id)
                .transpose()?,
            occurred_at: row::parse_ts(&r.get::<String, _>("occurred_at"))?,
        })
    }
}

#[async_trait]
impl UsageLedger for SqliteUsageLedger {
    async fn append(&self, event: &UsageEvent) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("usage append").await?;
        sqlx::query(
            "INSERT INTO usage_events \
             (id, event_type, units, cost_credits, campaign_id, document_id, job_id, occurred_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(event.event_type.as_str())
        .bind(event.units)
        .bind(event.cost_credits)
        .bind(event.campaign_id.map(|id| id.to_string()))
        .bind(event.document_id.map(|id| id.to_string()))
        .bind(event.job_id.map(|id| id.to_string()))
        .bind(row::fmt_ts(&event.occurred_at))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("append usage event", e))?;
        Ok(())
    }

    async fn list_for_document(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<UsageEvent>, EngineError> {
        let pool = self.manager.tenant_pool("usage list").await?;
        let rows = sqlx::query(
            "SELECT * FROM usage_events WHERE document_id = ? ORDER BY occurred_at",
        )
        .bind(document_id.to_string())
        .fetch_all(&pool)
        .await
        .map_err(|e| row::db_err("list usage events", e))?;
        rows.iter().map(Self::map).collect()
    }

    async fn list_for_job(&self, job_id: JobId) -> Result<Vec<UsageEvent>, EngineError> {
        let pool = self.manager.tenant_pool("usage list").await?;
        let rows = sqlx::query("SELECT * FROM usage_events WHERE job_id = ? ORDER BY occurred_at")
            .bind(job_id.to_string())
            .fetch_all(&pool)
            .await
            .map_err(|e| row::db_err("list usage events", e))?;
        rows.iter().map(Self::map).collect()
    }

    async fn count_by_type(&self, event_type: UsageEventType) -> Result<i64, EngineError> {
        let pool = self.manager.tenant_pool("usage count").await?;
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM usage_events WHERE event_type = ?")
                .bind(event_type.as_str())
                .fetch_one(&pool)
                .await
                .map_err(|e| row::db_err("count usage events", e))?;
        Ok(count)
    }
}

pub struct SqliteAuditLedger {
    manager: Arc<ConnectionManager>,
}

impl SqliteAuditLedger {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<AuditEntry, EngineError> {
        Ok(AuditEntry {
            id: row::parse_id(&r.get::<String, _>("id"))?,
            auditable_type: r.get("auditable_type"),
            auditable_id: r.get("auditable_id"),
            event: r.get("event"),
            old_values: r
                .get::<Option<String>, _>("old_values")
                .as_deref()
                .map(row::parse_json)
                .transpose()?,
            new_values: r
                .get::<Option<String>, _>("new_values")
                .as_deref()
                .map(row::parse_json)
                .transpose()?,
            user_id: r.get("user_id"),
            ip: r.get("ip"),
            tags: row::parse_json(&r.get::<String, _>("tags"))?,
            created_at: row::parse_ts(&r.get::<String, _>("created_at"))?,
        })
    }
}

#[async_trait]
impl AuditLedger for SqliteAuditLedger {
    async fn append(&self, entry: &AuditEntry) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("audit append").await?;
        sqlx::query(
            "INSERT INTO audit_logs \
             (id, auditable_type, auditable_id, event, old_values, new_values, user_id, ip, \
              tags, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(&entry.auditable_type)
        .bind(&entry.auditable_id)
        .bind(&entry.event)
        .bind(entry.old_values.as_ref().map(row::to_json).transpose()?)
        .bind(entry.new_values.as_ref().map(row::to_json).transpose()?)
        .bind(&entry.user_id)
        .bind(&entry.ip)
        .bind(row::to_json(&entry.tags)?)
        .bind(row::fmt_ts(&entry.created_at))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("append audit entry", e))?;
        Ok(())
    }

    async fn list_for(
        &self,
        auditable_type: &str,
        auditable_id: &str,
    ) -> Result<Vec<AuditEntry>, EngineError> {
        let pool = self.manager.tenant_pool("audit list").await?;
        let rows = sqlx::query(
            "SELECT * FROM audit_logs WHERE auditable_type = ? AND auditable_id = ? \
             ORDER BY created_at",
        )
        .bind(auditable_type)
        .bind(auditable_id)
        .fetch_all(&pool)
        .await
        .map_err(|e| row::db_err("list audit entries", e))?;
        rows.iter().map(Self::map).collect()
    }

    async fn count(&self) -> Result<i64, EngineError> {
        let pool = self.manager.tenant_pool("audit count").await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(&pool)
            .await
            .map_err(|e| row::db_err("count audit entries", e))?;
        Ok(count)
    }
}
