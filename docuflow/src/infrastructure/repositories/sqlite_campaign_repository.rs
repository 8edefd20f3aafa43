// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the campaign repository.
//!
//! Tenant-scoped: every operation resolves the pool through the connection
//! manager from the current tenant binding, so a missing binding fails the
//! call before any SQL runs.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::entities::campaign::{CampaignSettings, ChecklistItem};
use docuflow_domain::repositories::CampaignRepository;
use docuflow_domain::{Campaign, CampaignId, CampaignState, CampaignType, EngineError, PipelineConfig};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteCampaignRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteCampaignRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<Campaign, EngineError> {
        let settings: CampaignSettings = row::parse_json(&r.get::<String, _>("settings"))?;
        let pipeline_config: PipelineConfig =
            row::parse_json(&r.get::<String, _>("pipeline_config"))?;
        let checklist: Option<Vec<ChecklistItem>> = r
            .get::<Option<String>, _>("checklist_template")
            .as_deref()
            .map(row::parse_json)
            .transpose()?;

        Ok(Campaign::from_parts(
            row::parse_id(&r.get::<String, _>("id"))?,
            r.get("slug"),
            r.get("name"),
            r.get("description"),
            CampaignType::from_str(&r.get::<String, _>("kind"))?,
            CampaignState::from_str(&r.get::<String, _>("state"))?,
            pipeline_config,
            settings,
            row::parse_json(&r.get::<String, _>("allowed_mime_types"))?,
            r.get("max_file_size_bytes"),
            r.get("max_concurrent_jobs"),
            r.get("retention_days"),
            checklist,
            r.get("credentials"),
            row::parse_opt_ts(r.get("published_at"))?,
            row::parse_ts(&r.get::<String, _>("created_at"))?,
            row::parse_ts(&r.get::<String, _>("updated_at"))?,
        ))
    }
}

#[async_trait]
impl CampaignRepository for SqliteCampaignRepository {
    async fn insert(&self, campaign: &Campaign) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("campaign insert").await?;
        sqlx::query(
            "INSERT INTO campaigns \
             (id, slug, name, description, kind, state, pipeline_config, settings, \
              allowed_mime_types, max_file_size_bytes, max_concurrent_jobs, retention_days, \
              checklist_template, credentials, published_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(campaign.id().to_string())
        .bind(campaign.slug())
        .bind(campaign.name())
        .bind(campaign.description())
        .bind(campaign.kind().as_str())
        .bind(campaign.state().as_str())
        .bind(row::to_json(campaign.pipeline_config())?)
        .bind(row::to_json(campaign.settings())?)
        .bind(row::to_json(&campaign.allowed_mime_types())?)
        .bind(campaign.max_file_size_bytes())
        .bind(campaign.max_concurrent_jobs())
        .bind(campaign.retention_days())
        .bind(campaign.checklist_template().map(|c| row::to_json(&c)).transpose()?)
        .bind(None::<String>)
        .bind(row::fmt_opt_ts(campaign.published_at()))
        .bind(row::fmt_ts(campaign.created_at()))
        .bind(row::fmt_ts(campaign.updated_at()))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("insert campaign", e))?;
        Ok(())
    }

    async fn save(&self, campaign: &Campaign) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("campaign save").await?;
        sqlx::query(
            "UPDATE campaigns SET name = ?, description = ?, state = ?, pipeline_config = ?, \
             settings = ?, allowed_mime_types = ?, max_file_size_bytes = ?, \
             max_concurrent_jobs = ?, retention_days = ?, checklist_template = ?, \
             published_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(campaign.name())
        .bind(campaign.description())
        .bind(campaign.state().as_str())
        .bind(row::to_json(campaign.pipeline_config())?)
        .bind(row::to_json(campaign.settings())?)
        .bind(row::to_json(&campaign.allowed_mime_types())?)
        .bind(campaign.max_file_size_bytes())
        .bind(campaign.max_concurrent_jobs())
        .bind(campaign.retention_days())
        .bind(campaign.checklist_template().map(|c| row::to_json(&c)).transpose()?)
        .bind(row::fmt_opt_ts(campaign.published_at()))
        .bind(row::fmt_ts(campaign.updated_at()))
        .bind(campaign.id().to_string())
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("save campaign", e))?;
        Ok(())
    }

    async fn find_by_id(&self, id: CampaignId) -> Result<Option<Campaign>, EngineError> {
        let pool = self.manager.tenant_pool("campaign lookup").await?;
        let found = sqlx::query("SELECT * FROM campaigns WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find campaign by id", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Campaign>, EngineError> {
        let pool = self.manager.tenant_pool("campaign lookup").await?;
        let found = sqlx::query("SELECT * FROM campaigns WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find campaign by slug", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn list(&self) -> Result<Vec<Campaign>, EngineError> {
        let pool = self.manager.tenant_pool("campaign list").await?;
        let rows = sqlx::query("SELECT * FROM campaigns ORDER BY created_at DESC")
            .fetch_all(&pool)
            .await
            .map_err(|e| row::db_err("list campaigns", e))?;
        rows.iter().map(Self::map).collect()
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, EngineError> {
        let pool = self.manager.tenant_pool("campaign slug check").await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM campaigns WHERE slug = ?")
            .bind(slug)
            .fetch_one(&pool)
            .await
            .map_err(|e| row::db_err("campaign slug check", e))?;
        Ok(count > 0)
    }
}
