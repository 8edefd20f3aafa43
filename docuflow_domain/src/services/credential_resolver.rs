// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hierarchical Credential Resolution
//!
//! Credentials are stored as a single table with a `(scope, scope_ref)`
//! compound key; resolution is four indexed lookups, narrowest scope first:
//!
//! 1. `(key, processor, processor_slug)`
//! 2. `(key, campaign, campaign_id)`
//! 3. `(key, tenant, tenant_id)`
//! 4. `(key, system)`
//!
//! Expired or soft-deleted credentials are treated as absent, so removing a
//! narrower scope transparently exposes the broader one. Every successful
//! resolution touches `last_used_at`. Decryption happens here - the last
//! possible moment - through the [`CredentialCipher`] port; everything
//! upstream only ever sees ciphertext.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entities::credential::CredentialScope;
use crate::error::EngineError;
use crate::repositories::credential_repository::CredentialRepository;
use crate::value_objects::{CampaignId, TenantId};

/// Scope references for one resolution walk.
#[derive(Debug, Clone, Default)]
pub struct CredentialLookup {
    pub processor_slug: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub tenant_id: Option<TenantId>,
}

impl CredentialLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_processor(mut self, slug: impl Into<String>) -> Self {
        self.processor_slug = Some(slug.into());
        self
    }

    pub fn for_campaign(mut self, campaign_id: CampaignId) -> Self {
        self.campaign_id = Some(campaign_id);
        self
    }

    pub fn for_tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }
}

/// Symmetric encryption port for credential values at rest.
pub trait CredentialCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, EngineError>;
    fn decrypt(&self, ciphertext: &str) -> Result<String, EngineError>;
}

/// Runtime credential resolution as seen by processors.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Resolves a key through the scope hierarchy; `None` when absent in all
    /// four scopes.
    async fn resolve(
        &self,
        key: &str,
        lookup: &CredentialLookup,
    ) -> Result<Option<String>, EngineError>;

    /// Resolves a key that must exist; absence is `CredentialNotFound`.
    async fn resolve_required(
        &self,
        key: &str,
        lookup: &CredentialLookup,
    ) -> Result<String, EngineError> {
        self.resolve(key, lookup).await?.ok_or_else(|| {
            EngineError::CredentialNotFound(format!(
                "'{}' absent in processor, campaign, tenant, and system scopes",
                key
            ))
        })
    }
}

/// The four-scope resolver over the credential repository.
pub struct HierarchicalCredentialResolver {
    repository: Arc<dyn CredentialRepository>,
    cipher: Arc<dyn CredentialCipher>,
}

impl HierarchicalCredentialResolver {
    pub fn new(
        repository: Arc<dyn CredentialRepository>,
        cipher: Arc<dyn CredentialCipher>,
    ) -> Self {
        Self { repository, cipher }
    }

    /// The scope walk, narrowest first, from the lookup's populated refs.
    fn scope_chain(lookup: &CredentialLookup) -> Vec<(CredentialScope, Option<String>)> {
        let mut chain = Vec::with_capacity(4);
        if let Some(slug) = &lookup.processor_slug {
            chain.push((CredentialScope::Processor, Some(slug.clone())));
        }
        if let Some(campaign_id) = &lookup.campaign_id {
            chain.push((CredentialScope::Campaign, Some(campaign_id.to_string())));
        }
        if let Some(tenant_id) = &lookup.tenant_id {
            chain.push((CredentialScope::Tenant, Some(tenant_id.to_string())));
        }
        chain.push((CredentialScope::System, None));
        chain
    }
}

#[async_trait]
impl CredentialResolver for HierarchicalCredentialResolver {
    async fn resolve(
        &self,
        key: &str,
        lookup: &CredentialLookup,
    ) -> Result<Option<String>, EngineError> {
        let now = chrono::Utc::now();
        for (scope, scope_ref) in Self::scope_chain(lookup) {
            let found = self
                .repository
                .find(key, scope, scope_ref.as_deref())
                .await?;
            if let Some(credential) = found {
                if !credential.is_usable(now) {
                    continue;
                }
                self.repository.touch_last_used(credential.id, now).await?;
                let plaintext = self.cipher.decrypt(&credential.encrypted_value)?;
                return Ok(Some(plaintext));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_chain_is_narrowest_first_and_always_ends_at_system() {
        let lookup = CredentialLookup::new()
            .for_processor("ocr")
            .for_campaign(CampaignId::new())
            .for_tenant(TenantId::new());
        let chain = HierarchicalCredentialResolver::scope_chain(&lookup);
        let scopes: Vec<_> = chain.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            scopes,
            vec![
                CredentialScope::Processor,
                CredentialScope::Campaign,
                CredentialScope::Tenant,
                CredentialScope::System,
            ]
        );
    }

    #[test]
    fn absent_refs_skip_their_scope() {
        let lookup = CredentialLookup::new().for_tenant(TenantId::new());
        let chain = HierarchicalCredentialResolver::scope_chain(&lookup);
        let scopes: Vec<_> = chain.iter().map(|(s, _)| *s).collect();
        assert_eq!(scopes, vec![CredentialScope::Tenant, CredentialScope::System]);
    }
}
