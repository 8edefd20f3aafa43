// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Validation Processor
//!
//! Applies tenant-defined custom rules to extracted fields (the CSV/table
//! import path). The step config maps field names to rule slugs and may
//! list required fields; failure messages are rendered in the locale chain
//! campaign setting > tenant setting > `en`. Rule violations are business
//! failures, not infrastructure trouble, and they are never retriable.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use docuflow_domain::repositories::ValidationRuleRepository;
use docuflow_domain::services::{
    Processor, ProcessorContext, ProcessorDescriptor, ProcessorOutcome,
};
use docuflow_domain::{EngineError, FailureKind, ProcessorCategory};

use crate::infrastructure::tenancy::context::TenantContext;
use crate::infrastructure::validation::custom_rules;

pub struct ValidationProcessor {
    rules: Arc<dyn ValidationRuleRepository>,
}

impl ValidationProcessor {
    pub fn new(rules: Arc<dyn ValidationRuleRepository>) -> Self {
        Self { rules }
    }

    /// The merged field map produced by earlier steps.
    fn prior_fields(ctx: &ProcessorContext) -> serde_json::Map<String, Value> {
        let mut merged = serde_json::Map::new();
        for output in ctx.prior_outputs.values() {
            if let Some(fields) = output.get("fields").and_then(Value::as_object) {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        merged
    }

    fn locale_chain(ctx: &ProcessorContext) -> Vec<String> {
        let mut chain = Vec::new();
        if let Some(locale) = &ctx.campaign.settings().locale {
            chain.push(locale.clone());
        }
        if let Some(tenant) = TenantContext::current() {
            if let Some(locale) = tenant.locale() {
                chain.push(locale.to_string());
            }
        }
        chain
    }
}

#[async_trait]
impl Processor for ValidationProcessor {
    fn id(&self) -> &str {
        "validation"
    }

    fn describe(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new(
            "Custom Rule Validation",
            ProcessorCategory::Validation,
            json!({
                "type": "object",
                "properties": {
                    "rules": {
                        "type": "object",
                        "additionalProperties": { "type": "string" }
                    },
                    "required": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                }
            }),
        )
        .with_output_schema(json!({
            "type": "object",
            "required": ["valid", "checked"],
            "properties": {
                "valid": { "type": "boolean" },
                "checked": { "type": "integer", "minimum": 0 }
            }
        }))
    }

    async fn execute(&self, ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
        let fields = Self::prior_fields(ctx);
        let locale_chain = Self::locale_chain(ctx);
        let locales: Vec<&str> = locale_chain.iter().map(String::as_str).collect();

        let mut messages: Vec<String> = Vec::new();

        if let Some(required) = ctx.config().get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                let missing = fields.get(name).map(Value::is_null).unwrap_or(true);
                if missing {
                    messages.push(format!("{} is required", name));
                }
            }
        }

        let mut checked = 0usize;
        if let Some(rule_map) = ctx.config().get("rules").and_then(Value::as_object) {
            for (attribute, rule_slug) in rule_map {
                let Some(rule_slug) = rule_slug.as_str() else {
                    continue;
                };
                let Some(value) = fields.get(attribute).filter(|v| !v.is_null()) else {
                    continue;
                };
                let rule = self.rules.find_by_slug(rule_slug).await?.ok_or_else(|| {
                    EngineError::invalid_config(format!(
                        "validation step references unknown rule '{}'",
                        rule_slug
                    ))
                })?;
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                checked += 1;
                if let Some(violation) =
                    custom_rules::check(&rule, attribute, &rendered, &locales)?
                {
                    messages.push(violation.message);
                }
            }
        }

        if messages.is_empty() {
            Ok(ProcessorOutcome::Success {
                output: json!({ "valid": true, "checked": checked }),
                tokens_used: 0,
                cost_credits: 0.0,
                metadata_delta: json!({ "validated": true }),
            })
        } else {
            Ok(ProcessorOutcome::failure(
                FailureKind::InvalidInput,
                messages.join("; "),
                false,
            ))
        }
    }
}
