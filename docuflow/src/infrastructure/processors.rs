// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Built-in processor implementations and their discovery.
//!
//! Discovery runs at startup - the registry never assumes in-memory state
//! survived a restart - and registers both live instances and the
//! `class_ref` factories the lazy tenant-record path resolves against.

pub mod classification;
pub mod enrichment;
pub mod extraction;
pub mod notification;
pub mod ocr;
pub mod validation;

use std::sync::Arc;

use docuflow_domain::repositories::ValidationRuleRepository;

use crate::infrastructure::registry::processor_registry::ProcessorRegistry;

pub use classification::ClassificationProcessor;
pub use enrichment::EnrichmentProcessor;
pub use extraction::ExtractionProcessor;
pub use notification::NotificationProcessor;
pub use ocr::OcrProcessor;
pub use validation::ValidationProcessor;

/// Registers the built-in processors and their lazy-load factories.
pub fn install_builtin(
    registry: &mut ProcessorRegistry,
    rules: Arc<dyn ValidationRuleRepository>,
) {
    registry.register(Arc::new(OcrProcessor));
    registry.register(Arc::new(ClassificationProcessor));
    registry.register(Arc::new(ExtractionProcessor));
    registry.register(Arc::new(ValidationProcessor::new(rules.clone())));
    registry.register(Arc::new(EnrichmentProcessor));
    registry.register(Arc::new(NotificationProcessor));

    registry.register_factory("OcrProcessor", || {
        Arc::new(OcrProcessor) as Arc<dyn docuflow_domain::Processor>
    });
    registry.register_factory("ClassificationProcessor", || {
        Arc::new(ClassificationProcessor) as Arc<dyn docuflow_domain::Processor>
    });
    registry.register_factory("ExtractionProcessor", || {
        Arc::new(ExtractionProcessor) as Arc<dyn docuflow_domain::Processor>
    });
    let rules_for_factory = rules.clone();
    registry.register_factory("ValidationProcessor", move || {
        Arc::new(ValidationProcessor::new(rules_for_factory.clone()))
            as Arc<dyn docuflow_domain::Processor>
    });
    registry.register_factory("EnrichmentProcessor", || {
        Arc::new(EnrichmentProcessor) as Arc<dyn docuflow_domain::Processor>
    });
    registry.register_factory("NotificationProcessor", || {
        Arc::new(NotificationProcessor) as Arc<dyn docuflow_domain::Processor>
    });
}
