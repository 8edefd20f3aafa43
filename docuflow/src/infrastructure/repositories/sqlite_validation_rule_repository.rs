// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! SQLite implementation of the custom validation rule repository.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use docuflow_domain::repositories::ValidationRuleRepository;
use docuflow_domain::{CustomValidationRule, EngineError, RuleType};

use crate::infrastructure::repositories::row;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct SqliteValidationRuleRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteValidationRuleRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    fn map(r: &sqlx::sqlite::SqliteRow) -> Result<CustomValidationRule, EngineError> {
        Ok(CustomValidationRule {
            id: row::parse_id(&r.get::<String, _>("id"))?,
            slug: r.get("slug"),
            rule_type: RuleType::from_str(&r.get::<String, _>("rule_type"))?,
            config: row::parse_json(&r.get::<String, _>("config"))?,
            translations: row::parse_json(&r.get::<String, _>("translations"))?,
            placeholders: row::parse_json(&r.get::<String, _>("placeholders"))?,
            created_at: row::parse_ts(&r.get::<String, _>("created_at"))?,
        })
    }
}

#[async_trait]
impl ValidationRuleRepository for SqliteValidationRuleRepository {
    async fn upsert(&self, rule: &CustomValidationRule) -> Result<(), EngineError> {
        let pool = self.manager.tenant_pool("validation rule upsert").await?;
        sqlx::query(
            "INSERT INTO custom_validation_rules \
             (id, slug, rule_type, config, translations, placeholders, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (slug) DO UPDATE SET \
               rule_type = excluded.rule_type, \
               config = excluded.config, \
               translations = excluded.translations, \
               placeholders = excluded.placeholders",
        )
        .bind(rule.id.to_string())
        .bind(&rule.slug)
        .bind(rule.rule_type.as_str())
        .bind(row::to_json(&rule.config)?)
        .bind(row::to_json(&rule.translations)?)
        .bind(row::to_json(&rule.placeholders)?)
        .bind(row::fmt_ts(&rule.created_at))
        .execute(&pool)
        .await
        .map_err(|e| row::db_err("upsert validation rule", e))?;
        Ok(())
    }

    async fn find_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<CustomValidationRule>, EngineError> {
        let pool = self.manager.tenant_pool("validation rule lookup").await?;
        let found = sqlx::query("SELECT * FROM custom_validation_rules WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&pool)
            .await
            .map_err(|e| row::db_err("find validation rule", e))?;
        found.map(|r| Self::map(&r)).transpose()
    }

    async fn list(&self) -> Result<Vec<CustomValidationRule>, EngineError> {
        let pool = self.manager.tenant_pool("validation rule list").await?;
        let rows = sqlx::query("SELECT * FROM custom_validation_rules ORDER BY slug")
            .fetch_all(&pool)
            .await
            .map_err(|e| row::db_err("list validation rules", e))?;
        rows.iter().map(Self::map).collect()
    }
}
