// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Campaign repository port.
//!
//! Tenant-scoped: implementations resolve against the current tenant handle
//! and must refuse to operate without a tenant binding.

use async_trait::async_trait;

use crate::entities::campaign::Campaign;
use crate::error::EngineError;
use crate::value_objects::CampaignId;

/// Persistence port for campaigns.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Inserts a new campaign.
    async fn insert(&self, campaign: &Campaign) -> Result<(), EngineError>;

    /// Persists the current state of an existing campaign.
    async fn save(&self, campaign: &Campaign) -> Result<(), EngineError>;

    async fn find_by_id(&self, id: CampaignId) -> Result<Option<Campaign>, EngineError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Campaign>, EngineError>;

    /// Lists campaigns for the bound tenant, newest first.
    async fn list(&self) -> Result<Vec<Campaign>, EngineError>;

    /// Checks slug uniqueness within the bound tenant.
    async fn slug_exists(&self, slug: &str) -> Result<bool, EngineError>;
}
