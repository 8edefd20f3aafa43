// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tenant Provisioning
//!
//! Explicit provisioning is the one authoritative path: the catalog row is
//! inserted and the physical `tenant_<id>` database is allocated and
//! migrated before the command returns, so a freshly provisioned tenant is
//! immediately usable. There is no implicit seed path.

use std::sync::Arc;

use tracing::info;

use docuflow_domain::entities::tenant::MembershipRole;
use docuflow_domain::repositories::AuditLedger;
use docuflow_domain::{AuditEntry, EngineError, Tenant, User};

use crate::infrastructure::tenancy::catalog::TenantCatalog;
use crate::infrastructure::tenancy::connection_manager::ConnectionManager;

pub struct ProvisionTenant {
    catalog: Arc<TenantCatalog>,
    connections: Arc<ConnectionManager>,
    audit: Arc<dyn AuditLedger>,
}

impl ProvisionTenant {
    pub fn new(
        catalog: Arc<TenantCatalog>,
        connections: Arc<ConnectionManager>,
        audit: Arc<dyn AuditLedger>,
    ) -> Self {
        Self {
            catalog,
            connections,
            audit,
        }
    }

    /// Provisions a tenant and optionally its owning user.
    pub async fn provision(
        &self,
        slug: &str,
        email: &str,
        owner_email: Option<&str>,
    ) -> Result<Tenant, EngineError> {
        if self.catalog.find_by_slug(slug).await?.is_some() {
            return Err(EngineError::invalid_config(format!(
                "tenant slug '{}' already exists",
                slug
            )));
        }

        let tenant = Tenant::new(slug.to_string(), email.to_string())?;
        self.catalog.insert(&tenant).await?;

        // Allocate and migrate the physical database eagerly; a failure
        // here surfaces as TenantSchemaInitializationFailed with the
        // catalog row intact for the operator to retry.
        self.connections.acquire(&tenant).await?;

        if let Some(owner_email) = owner_email {
            let user = User::new(owner_email.to_string());
            self.catalog.insert_user(&user).await?;
            self.catalog
                .add_membership(user.id, tenant.id(), MembershipRole::Owner)
                .await?;
        }

        // First entry in the tenant's own audit trail.
        let tenant_for_audit = tenant.clone();
        self.connections
            .with_tenant(tenant_for_audit, async {
                self.audit
                    .append(
                        &AuditEntry::new("tenant", tenant.id().to_string(), "provisioned")
                            .tagged("provisioning"),
                    )
                    .await
            })
            .await?;

        info!(tenant = %tenant.slug(), database = %tenant.database_name(), "Tenant provisioned");
        Ok(tenant)
    }
}
