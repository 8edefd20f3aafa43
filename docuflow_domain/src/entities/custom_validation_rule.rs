// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Custom Validation Rules
//!
//! Tenant-scoped row-level validation rules used by table-oriented
//! processors on the CSV import path. A rule declares its mechanism
//! (`regex` or `expression`), a configuration object, and localized failure
//! messages with per-locale placeholder maps.
//!
//! Message rendering substitutes `:attribute`, `:value`, and any
//! rule-defined placeholders; the locale is resolved by the caller
//! (campaign settings over tenant settings over `en`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::value_objects::RuleId;

/// Fallback locale when neither campaign nor tenant configures one.
pub const DEFAULT_LOCALE: &str = "en";

/// Rule mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Regex,
    Expression,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Regex => "regex",
            RuleType::Expression => "expression",
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regex" => Ok(RuleType::Regex),
            "expression" => Ok(RuleType::Expression),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown validation rule type: {}",
                s
            ))),
        }
    }
}

/// A tenant-defined row-level validation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomValidationRule {
    pub id: RuleId,
    pub slug: String,
    pub rule_type: RuleType,
    pub config: Value,
    /// Failure message templates keyed by locale.
    pub translations: HashMap<String, String>,
    /// Placeholder substitutions keyed by locale, then placeholder name.
    pub placeholders: HashMap<String, HashMap<String, String>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl CustomValidationRule {
    pub fn new(slug: String, rule_type: RuleType, config: Value) -> Self {
        CustomValidationRule {
            id: RuleId::new(),
            slug,
            rule_type,
            config,
            translations: HashMap::new(),
            placeholders: HashMap::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_translation(mut self, locale: &str, template: &str) -> Self {
        self.translations.insert(locale.to_string(), template.to_string());
        self
    }

    pub fn with_placeholder(mut self, locale: &str, name: &str, value: &str) -> Self {
        self.placeholders
            .entry(locale.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Renders the failure message for the first locale in the chain that
    /// has a translation, falling back to `en`, then to a bare default.
    pub fn render_message(&self, locale_chain: &[&str], attribute: &str, value: &str) -> String {
        let locale = locale_chain
            .iter()
            .copied()
            .chain(std::iter::once(DEFAULT_LOCALE))
            .find(|l| self.translations.contains_key(*l));

        let Some(locale) = locale else {
            return format!("validation failed for {}", attribute);
        };

        let template = &self.translations[locale];
        let mut message = template
            .replace(":attribute", attribute)
            .replace(":value", value);

        if let Some(subs) = self.placeholders.get(locale) {
            for (name, replacement) in subs {
                message = message.replace(&format!(":{}", name), replacement);
            }
        }
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule() -> CustomValidationRule {
        CustomValidationRule::new("amount-positive".into(), RuleType::Expression, json!({"op": "gt", "value": 0}))
            .with_translation("en", ":attribute must be greater than :min (got :value)")
            .with_translation("de", ":attribute muss größer als :min sein")
            .with_placeholder("en", "min", "0")
            .with_placeholder("de", "min", "0")
    }

    #[test]
    fn renders_in_the_first_locale_with_a_translation() {
        let message = rule().render_message(&["de"], "amount", "-3");
        assert_eq!(message, "amount muss größer als 0 sein");
    }

    #[test]
    fn falls_back_to_en_when_locale_is_missing() {
        let message = rule().render_message(&["fr"], "amount", "-3");
        assert_eq!(message, "amount must be greater than 0 (got -3)");
    }

    #[test]
    fn missing_translations_fall_back_to_a_bare_default() {
        let bare = CustomValidationRule::new("r".into(), RuleType::Regex, json!({"pattern": "^a"}));
        assert_eq!(bare.render_message(&["fr"], "code", "b"), "validation failed for code");
    }
}
