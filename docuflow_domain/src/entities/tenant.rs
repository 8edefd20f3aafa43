// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Catalog Entities
//!
//! Central (non-tenant-scoped) entities: the tenant registry itself, the
//! host-to-tenant domain mapping, and users with tenant memberships.
//!
//! A tenant's physical database `tenant_<id>` is allocated at provisioning
//! time and soft-deleted tenants are never hard-dropped. Cross-database
//! references into tenant tables (e.g. `user_id` on an audit entry) are
//! stored as opaque identifiers, never as enforced foreign keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::value_objects::{TenantId, UserId};

/// Tenant account status. Suspended tenants are refused at the worker and
/// request boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
    Cancelled,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Suspended => "suspended",
            TenantStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TenantStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TenantStatus::Active),
            "suspended" => Ok(TenantStatus::Suspended),
            "cancelled" => Ok(TenantStatus::Cancelled),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown tenant status: {}",
                s
            ))),
        }
    }
}

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantTier {
    Starter,
    Professional,
    Enterprise,
}

impl TenantTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantTier::Starter => "starter",
            TenantTier::Professional => "professional",
            TenantTier::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for TenantTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TenantTier {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "starter" => Ok(TenantTier::Starter),
            "professional" => Ok(TenantTier::Professional),
            "enterprise" => Ok(TenantTier::Enterprise),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown tenant tier: {}",
                s
            ))),
        }
    }
}

/// A tenant account in the central catalog.
///
/// Identity maps to a physical database location: every tenant owns
/// `tenant_<id>` and all tenant-scoped repositories resolve against that
/// handle. The `credentials` blob is opaque ciphertext managed by the
/// credential store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    id: TenantId,
    slug: String,
    email: String,
    status: TenantStatus,
    tier: TenantTier,
    settings: Value,
    credentials: Option<String>,
    credit_balance: i64,
    trial_ends_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Tenant {
    /// Creates a new active tenant on the starter tier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the slug is empty or contains
    /// characters unsafe for a database name.
    pub fn new(slug: String, email: String) -> Result<Self, EngineError> {
        if slug.is_empty() {
            return Err(EngineError::invalid_config("Tenant slug cannot be empty"));
        }
        if !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(EngineError::invalid_config(format!(
                "Tenant slug '{}' must be lowercase alphanumeric with '-' or '_'",
                slug
            )));
        }

        let now = chrono::Utc::now();

        Ok(Tenant {
            id: TenantId::new(),
            slug,
            email,
            status: TenantStatus::Active,
            tier: TenantTier::Starter,
            settings: Value::Object(serde_json::Map::new()),
            credentials: None,
            credit_balance: 0,
            trial_ends_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Rehydrates a tenant from persisted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: TenantId,
        slug: String,
        email: String,
        status: TenantStatus,
        tier: TenantTier,
        settings: Value,
        credentials: Option<String>,
        credit_balance: i64,
        trial_ends_at: Option<chrono::DateTime<chrono::Utc>>,
        created_at: chrono::DateTime<chrono::Utc>,
        updated_at: chrono::DateTime<chrono::Utc>,
        deleted_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Self {
        Tenant {
            id,
            slug,
            email,
            status,
            tier,
            settings,
            credentials,
            credit_balance,
            trial_ends_at,
            created_at,
            updated_at,
            deleted_at,
        }
    }

    pub fn id(&self) -> TenantId {
        self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn status(&self) -> TenantStatus {
        self.status
    }

    pub fn tier(&self) -> TenantTier {
        self.tier
    }

    pub fn settings(&self) -> &Value {
        &self.settings
    }

    pub fn credentials(&self) -> Option<&str> {
        self.credentials.as_deref()
    }

    pub fn credit_balance(&self) -> i64 {
        self.credit_balance
    }

    pub fn trial_ends_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.trial_ends_at.as_ref()
    }

    pub fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.created_at
    }

    pub fn updated_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.updated_at
    }

    pub fn deleted_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.deleted_at.as_ref()
    }

    /// Name of the tenant's physical database.
    pub fn database_name(&self) -> String {
        format!("tenant_{}", self.id)
    }

    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active && self.deleted_at.is_none()
    }

    /// Locale from tenant settings, if configured.
    pub fn locale(&self) -> Option<&str> {
        self.settings.get("locale").and_then(Value::as_str)
    }

    /// Suspends the tenant. Workers drop units for suspended tenants.
    pub fn suspend(&mut self) {
        self.status = TenantStatus::Suspended;
        self.updated_at = chrono::Utc::now();
    }

    /// Soft-deletes the tenant; the physical database is never dropped.
    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(chrono::Utc::now());
        self.updated_at = chrono::Utc::now();
    }
}

/// Host-to-tenant mapping used to resolve tenant identity from an inbound
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantDomain {
    pub host: String,
    pub tenant_id: TenantId,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Role within a tenant membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Owner => "owner",
            MembershipRole::Admin => "admin",
            MembershipRole::Member => "member",
            MembershipRole::Viewer => "viewer",
        }
    }
}

impl std::str::FromStr for MembershipRole {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(MembershipRole::Owner),
            "admin" => Ok(MembershipRole::Admin),
            "member" => Ok(MembershipRole::Member),
            "viewer" => Ok(MembershipRole::Viewer),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown membership role: {}",
                s
            ))),
        }
    }
}

/// A platform user with tenant memberships.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub memberships: HashMap<String, MembershipRole>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    pub fn new(email: String) -> Self {
        User {
            id: UserId::new(),
            email,
            memberships: HashMap::new(),
            created_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_tenant_is_active_starter() {
        let tenant = Tenant::new("acme".into(), "ops@acme.test".into()).unwrap();
        assert!(tenant.is_active());
        assert_eq!(tenant.tier(), TenantTier::Starter);
        assert!(tenant.database_name().starts_with("tenant_"));
    }

    #[test]
    fn slug_must_be_database_safe() {
        assert!(Tenant::new("Acme Corp".into(), "a@b.test".into()).is_err());
        assert!(Tenant::new("".into(), "a@b.test".into()).is_err());
        assert!(Tenant::new("acme-corp_2".into(), "a@b.test".into()).is_ok());
    }

    #[test]
    fn suspension_and_soft_delete_deactivate() {
        let mut tenant = Tenant::new("acme".into(), "a@b.test".into()).unwrap();
        tenant.suspend();
        assert!(!tenant.is_active());

        let mut other = Tenant::new("beta".into(), "b@b.test".into()).unwrap();
        other.soft_delete();
        assert!(!other.is_active());
        assert!(other.deleted_at().is_some());
    }
}
