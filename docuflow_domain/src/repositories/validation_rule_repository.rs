// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Custom validation rule repository port (CSV import path).

use async_trait::async_trait;

use crate::entities::custom_validation_rule::CustomValidationRule;
use crate::error::EngineError;

/// Persistence port for tenant-scoped row validation rules.
#[async_trait]
pub trait ValidationRuleRepository: Send + Sync {
    async fn upsert(&self, rule: &CustomValidationRule) -> Result<(), EngineError>;

    async fn find_by_slug(&self, slug: &str)
        -> Result<Option<CustomValidationRule>, EngineError>;

    async fn list(&self) -> Result<Vec<CustomValidationRule>, EngineError>;
}
