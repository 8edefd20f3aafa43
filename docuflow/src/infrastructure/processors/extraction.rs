// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Extraction Processor
//!
//! Field extraction from recovered text. The step config maps document
//! categories to the fields wanted from them, e.g.
//! `{ "schema": { "invoice": ["total", "due_date"] } }`. Fields are located
//! by `name: value` / `name = value` patterns in the text; absent fields
//! come back as null so downstream validation can decide what is required.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use docuflow_domain::services::{
    Processor, ProcessorContext, ProcessorDescriptor, ProcessorOutcome,
};
use docuflow_domain::{EngineError, ProcessorCategory};

pub struct ExtractionProcessor;

impl ExtractionProcessor {
    fn prior_text(ctx: &ProcessorContext) -> String {
        ctx.prior_outputs
            .values()
            .filter_map(|output| output.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn prior_category(ctx: &ProcessorContext) -> Option<String> {
        ctx.prior_outputs
            .values()
            .filter_map(|output| output.get("category").and_then(Value::as_str))
            .last()
            .map(str::to_string)
    }

    fn extract_field(text: &str, field: &str) -> Option<String> {
        let pattern = format!(r"(?i){}\s*[:=]\s*(\S+)", regex::escape(field));
        let regex = Regex::new(&pattern).ok()?;
        regex
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim_end_matches([',', ';', '.']).to_string())
    }
}

#[async_trait]
impl Processor for ExtractionProcessor {
    fn id(&self) -> &str {
        "extraction"
    }

    fn describe(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new(
            "Field Extraction",
            ProcessorCategory::Extraction,
            json!({
                "type": "object",
                "required": ["schema"],
                "properties": {
                    "schema": {
                        "type": "object",
                        "additionalProperties": {
                            "type": "array",
                            "items": { "type": "string" }
                        }
                    }
                }
            }),
        )
        .with_output_schema(json!({
            "type": "object",
            "required": ["fields"],
            "properties": {
                "fields": { "type": "object" }
            }
        }))
    }

    async fn execute(&self, ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
        let schema = ctx
            .config()
            .get("schema")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let text = Self::prior_text(ctx);
        let category = Self::prior_category(ctx);

        // Fields wanted for this document's category; with no category
        // match, every declared field is attempted.
        let wanted: Vec<String> = match category.as_deref().and_then(|c| schema.get(c)) {
            Some(fields) => fields
                .as_array()
                .map(|list| {
                    list.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            None => schema
                .values()
                .filter_map(Value::as_array)
                .flatten()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        };

        let mut fields = BTreeMap::new();
        for field in wanted {
            let value = Self::extract_field(&text, &field);
            fields.insert(field, value.map(Value::String).unwrap_or(Value::Null));
        }

        let extracted_count = fields.values().filter(|v| !v.is_null()).count();

        Ok(ProcessorOutcome::Success {
            output: json!({ "fields": fields }),
            tokens_used: 0,
            cost_credits: 0.0,
            metadata_delta: json!({ "extracted_fields": extracted_count }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_colon_and_equals_fields() {
        assert_eq!(
            ExtractionProcessor::extract_field("Invoice Total: 42.50, Tax: 3", "total"),
            Some("42.50".to_string())
        );
        assert_eq!(
            ExtractionProcessor::extract_field("due_date = 2026-09-01", "due_date"),
            Some("2026-09-01".to_string())
        );
        assert_eq!(ExtractionProcessor::extract_field("no fields here", "total"), None);
    }
}
