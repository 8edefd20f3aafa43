// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Classification Processor
//!
//! Keyword classification over recovered text and the original filename.
//! The step config declares the candidate categories; the first category
//! whose name occurs in the text wins with high confidence, otherwise the
//! first candidate is assigned with low confidence so downstream steps
//! always see a category.

use async_trait::async_trait;
use serde_json::{json, Value};

use docuflow_domain::services::{
    Processor, ProcessorContext, ProcessorDescriptor, ProcessorOutcome,
};
use docuflow_domain::{EngineError, FailureKind, ProcessorCategory};

pub struct ClassificationProcessor;

impl ClassificationProcessor {
    /// Text visible to the classifier: every prior `text` output plus the
    /// original filename.
    fn corpus(ctx: &ProcessorContext) -> String {
        let mut corpus = String::new();
        for output in ctx.prior_outputs.values() {
            if let Some(text) = output.get("text").and_then(Value::as_str) {
                corpus.push_str(text);
                corpus.push(' ');
            }
        }
        corpus.push_str(ctx.document.original_filename());
        corpus.to_lowercase()
    }
}

#[async_trait]
impl Processor for ClassificationProcessor {
    fn id(&self) -> &str {
        "classification"
    }

    fn describe(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new(
            "Keyword Classification",
            ProcessorCategory::Classification,
            json!({
                "type": "object",
                "required": ["categories"],
                "properties": {
                    "categories": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1
                    }
                }
            }),
        )
        .with_output_schema(json!({
            "type": "object",
            "required": ["category"],
            "properties": {
                "category": { "type": "string" },
                "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
            }
        }))
    }

    async fn execute(&self, ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
        let categories: Vec<String> = ctx
            .config()
            .get("categories")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if categories.is_empty() {
            return Ok(ProcessorOutcome::failure(
                FailureKind::InvalidInput,
                "classification step config declares no categories",
                false,
            ));
        }

        let corpus = Self::corpus(ctx);
        let matched = categories
            .iter()
            .find(|category| corpus.contains(&category.to_lowercase()));

        let (category, confidence) = match matched {
            Some(category) => (category.clone(), 0.9),
            None => (categories[0].clone(), 0.3),
        };

        Ok(ProcessorOutcome::Success {
            output: json!({ "category": category, "confidence": confidence }),
            tokens_used: 0,
            cost_credits: 0.0,
            metadata_delta: json!({ "category": category }),
        })
    }
}
