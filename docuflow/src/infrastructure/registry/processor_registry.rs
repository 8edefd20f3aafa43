// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processor Registry
//!
//! Maps processor type slugs to executable implementations. The registry is
//! read-mostly: lookups clone an `Arc` snapshot of the slug map under a
//! short read lock, and the rare lazy addition swaps in a new map
//! (copy-on-write) so readers never block on a writer.
//!
//! Discovery seeds the built-ins at boot; the registry is rebuilt from
//! discovery on every process start and never assumes in-memory state
//! survived a restart. When the orchestrator meets a step whose slug is
//! unknown, `register_from_record` resolves the tenant's `processors` row
//! against the built-in factory table by `class_ref`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use docuflow_domain::services::Processor;
use docuflow_domain::{EngineError, ProcessorRecord};

type ProcessorMap = HashMap<String, Arc<dyn Processor>>;
type Factory = Box<dyn Fn() -> Arc<dyn Processor> + Send + Sync>;

/// Slug-indexed registry of processor implementations.
pub struct ProcessorRegistry {
    processors: RwLock<Arc<ProcessorMap>>,
    /// `class_ref` -> constructor, for records loaded from tenant databases.
    factories: HashMap<String, Factory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: RwLock::new(Arc::new(HashMap::new())),
            factories: HashMap::new(),
        }
    }

    /// Registers a processor instance under its own slug.
    pub fn register(&self, processor: Arc<dyn Processor>) {
        let slug = processor.id().to_string();
        let mut guard = self.processors.write();
        let mut next: ProcessorMap = (**guard).clone();
        next.insert(slug.clone(), processor);
        *guard = Arc::new(next);
        debug!(slug = %slug, "Processor registered");
    }

    /// Registers a constructor for lazy loading by `class_ref`.
    pub fn register_factory<F>(&mut self, class_ref: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Processor> + Send + Sync + 'static,
    {
        self.factories.insert(class_ref.into(), Box::new(factory));
    }

    /// Resolves a slug to an implementation.
    pub fn resolve(&self, slug: &str) -> Option<Arc<dyn Processor>> {
        self.processors.read().get(slug).cloned()
    }

    /// Augments the registry from a tenant `processors` row whose slug was
    /// loaded lazily. The row's `class_ref` must name a known constructor.
    pub fn register_from_record(&self, record: &ProcessorRecord) -> Result<(), EngineError> {
        if !record.active {
            return Err(EngineError::ProcessorNotRegistered(format!(
                "'{}' is registered but inactive",
                record.slug
            )));
        }
        let factory = self.factories.get(&record.class_ref).ok_or_else(|| {
            warn!(slug = %record.slug, class_ref = %record.class_ref, "No factory for class_ref");
            EngineError::ProcessorNotRegistered(format!(
                "'{}' references unknown implementation '{}'",
                record.slug, record.class_ref
            ))
        })?;
        let processor = factory();
        if processor.id() != record.slug {
            return Err(EngineError::ProcessorNotRegistered(format!(
                "'{}' implementation reports slug '{}'",
                record.slug,
                processor.id()
            )));
        }
        self.register(processor);
        info!(slug = %record.slug, "Processor lazily registered from tenant record");
        Ok(())
    }

    /// Registered slugs, sorted. Importer error messages use this.
    pub fn slugs(&self) -> Vec<String> {
        let mut slugs: Vec<String> = self.processors.read().keys().cloned().collect();
        slugs.sort();
        slugs
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.processors.read().contains_key(slug)
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docuflow_domain::services::{ProcessorContext, ProcessorDescriptor, ProcessorOutcome};
    use docuflow_domain::ProcessorCategory;
    use serde_json::json;

    struct FakeProcessor {
        slug: &'static str,
    }

    #[async_trait]
    impl Processor for FakeProcessor {
        fn id(&self) -> &str {
            self.slug
        }

        fn describe(&self) -> ProcessorDescriptor {
            ProcessorDescriptor::new("Fake", ProcessorCategory::Ocr, json!({}))
        }

        async fn execute(&self, _ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
            Ok(ProcessorOutcome::success(json!({})))
        }
    }

    fn fake_factory() -> Arc<dyn Processor> {
        Arc::new(FakeProcessor { slug: "fake" })
    }

    #[test]
    fn resolves_registered_slugs() {
        let registry = ProcessorRegistry::new();
        registry.register(Arc::new(FakeProcessor { slug: "ocr" }));
        assert!(registry.resolve("ocr").is_some());
        assert!(registry.resolve("missing").is_none());
        assert_eq!(registry.slugs(), vec!["ocr"]);
    }

    #[test]
    fn lazy_registration_checks_class_ref_and_slug() {
        let mut registry = ProcessorRegistry::new();
        registry.register_factory("FakeProcessor", fake_factory);

        let good = ProcessorRecord::new(
            "fake".into(),
            "Fake".into(),
            ProcessorCategory::Ocr,
            "FakeProcessor".into(),
            json!({}),
        )
        .unwrap();
        registry.register_from_record(&good).unwrap();
        assert!(registry.contains("fake"));

        let unknown_ref = ProcessorRecord::new(
            "other".into(),
            "Other".into(),
            ProcessorCategory::Ocr,
            "MissingProcessor".into(),
            json!({}),
        )
        .unwrap();
        assert!(matches!(
            registry.register_from_record(&unknown_ref).unwrap_err(),
            EngineError::ProcessorNotRegistered(_)
        ));

        let slug_mismatch = ProcessorRecord::new(
            "renamed".into(),
            "Renamed".into(),
            ProcessorCategory::Ocr,
            "FakeProcessor".into(),
            json!({}),
        )
        .unwrap();
        assert!(registry.register_from_record(&slug_mismatch).is_err());
    }

    #[test]
    fn inactive_records_do_not_register() {
        let mut registry = ProcessorRegistry::new();
        registry.register_factory("FakeProcessor", fake_factory);
        let mut record = ProcessorRecord::new(
            "fake".into(),
            "Fake".into(),
            ProcessorCategory::Ocr,
            "FakeProcessor".into(),
            json!({}),
        )
        .unwrap();
        record.active = false;
        assert!(registry.register_from_record(&record).is_err());
    }
}
