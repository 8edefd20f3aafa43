// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Credential Cache
//!
//! Read-through cache in front of the hierarchical resolver with a
//! per-entry TTL. Rotation invalidates by credential key. The cache key
//! includes the current tenant binding alongside every lookup ref, so a
//! value cached under one tenant can never answer a resolution under
//! another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use docuflow_domain::services::{CredentialLookup, CredentialResolver};
use docuflow_domain::EngineError;

use crate::infrastructure::tenancy::context::TenantContext;

/// Default per-entry lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    cached_at: Instant,
    value: Option<String>,
}

/// TTL read-through wrapper around a [`CredentialResolver`].
pub struct CachingCredentialResolver {
    inner: Arc<dyn CredentialResolver>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl CachingCredentialResolver {
    pub fn new(inner: Arc<dyn CredentialResolver>) -> Self {
        Self {
            inner,
            ttl: DEFAULT_TTL,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Drops every cached entry for a credential key, across all scopes
    /// and tenants. Called after rotation or deletion.
    pub fn invalidate(&self, key: &str) {
        let prefix = format!("{}|", key);
        self.entries
            .lock()
            .retain(|cache_key, _| !cache_key.starts_with(&prefix));
    }

    /// Drops everything. Operator escape hatch.
    pub fn invalidate_all(&self) {
        self.entries.lock().clear();
    }

    fn cache_key(key: &str, lookup: &CredentialLookup) -> String {
        let tenant = TenantContext::current()
            .map(|t| t.id().to_string())
            .unwrap_or_default();
        format!(
            "{}|{}|{}|{}|{}",
            key,
            tenant,
            lookup.processor_slug.as_deref().unwrap_or(""),
            lookup
                .campaign_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            lookup
                .tenant_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        )
    }
}

#[async_trait]
impl CredentialResolver for CachingCredentialResolver {
    async fn resolve(
        &self,
        key: &str,
        lookup: &CredentialLookup,
    ) -> Result<Option<String>, EngineError> {
        let cache_key = Self::cache_key(key, lookup);
        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(&cache_key) {
                if entry.cached_at.elapsed() < self.ttl {
                    return Ok(entry.value.clone());
                }
            }
        }

        let value = self.inner.resolve(key, lookup).await?;
        self.entries.lock().insert(
            cache_key,
            CacheEntry {
                cached_at: Instant::now(),
                value: value.clone(),
            },
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CredentialResolver for CountingResolver {
        async fn resolve(
            &self,
            _key: &str,
            _lookup: &CredentialLookup,
        ) -> Result<Option<String>, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some("secret".into()))
        }
    }

    #[tokio::test]
    async fn second_resolution_is_served_from_cache() {
        let inner = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let cache = CachingCredentialResolver::new(inner.clone());
        let lookup = CredentialLookup::new().for_processor("ocr");

        assert_eq!(cache.resolve("k", &lookup).await.unwrap().as_deref(), Some("secret"));
        assert_eq!(cache.resolve("k", &lookup).await.unwrap().as_deref(), Some("secret"));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidation_forces_a_fresh_read() {
        let inner = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let cache = CachingCredentialResolver::new(inner.clone());
        let lookup = CredentialLookup::new();

        cache.resolve("k", &lookup).await.unwrap();
        cache.invalidate("k");
        cache.resolve("k", &lookup).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refreshed() {
        let inner = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let cache = CachingCredentialResolver::new(inner.clone()).with_ttl(Duration::ZERO);
        let lookup = CredentialLookup::new();

        cache.resolve("k", &lookup).await.unwrap();
        cache.resolve("k", &lookup).await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
