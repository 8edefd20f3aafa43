// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Enrichment processor: merges configured constants and cheap derived
//! attributes (file extension, size class) into the document metadata.

use async_trait::async_trait;
use serde_json::{json, Value};

use docuflow_domain::services::{
    Processor, ProcessorContext, ProcessorDescriptor, ProcessorOutcome,
};
use docuflow_domain::{EngineError, ProcessorCategory};

pub struct EnrichmentProcessor;

impl EnrichmentProcessor {
    fn size_class(size_bytes: i64) -> &'static str {
        match size_bytes {
            s if s < 100 * 1024 => "small",
            s if s < 5 * 1024 * 1024 => "medium",
            _ => "large",
        }
    }
}

#[async_trait]
impl Processor for EnrichmentProcessor {
    fn id(&self) -> &str {
        "enrichment"
    }

    fn describe(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new(
            "Metadata Enrichment",
            ProcessorCategory::Enrichment,
            json!({
                "type": "object",
                "properties": {
                    "set": { "type": "object" }
                }
            }),
        )
    }

    async fn execute(&self, ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
        let mut enriched = serde_json::Map::new();

        if let Some(constants) = ctx.config().get("set").and_then(Value::as_object) {
            for (key, value) in constants {
                enriched.insert(key.clone(), value.clone());
            }
        }

        let extension = ctx
            .document
            .original_filename()
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase());
        if let Some(extension) = extension {
            enriched.insert("file_extension".into(), Value::String(extension));
        }
        enriched.insert(
            "size_class".into(),
            Value::String(Self::size_class(ctx.document.size_bytes()).to_string()),
        );

        Ok(ProcessorOutcome::Success {
            output: json!({ "enriched": enriched }),
            tokens_used: 0,
            cost_credits: 0.0,
            metadata_delta: Value::Object(enriched),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_classes_bucket_sensibly() {
        assert_eq!(EnrichmentProcessor::size_class(17), "small");
        assert_eq!(EnrichmentProcessor::size_class(2 * 1024 * 1024), "medium");
        assert_eq!(EnrichmentProcessor::size_class(50 * 1024 * 1024), "large");
    }
}
