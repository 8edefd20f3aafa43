// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Custom Rule Engine (CSV import path)
//!
//! Evaluates tenant-defined row-level validation rules against cell values.
//! Two mechanisms:
//!
//! - `regex` - config `{ "pattern": "..." }`, passes when the value matches
//! - `expression` - config `{ "op": "...", "value": ... }` with comparison
//!   operators `eq | ne | gt | gte | lt | lte | len_min | len_max | in`.
//!   Numeric comparisons apply when both sides parse as numbers; otherwise
//!   comparison is lexicographic.
//!
//! Failure messages are rendered through the rule's locale tables with
//! `:attribute`, `:value`, and rule-defined placeholders substituted. The
//! locale chain is campaign setting over tenant setting over `en`.

use regex::Regex;
use serde_json::Value;

use docuflow_domain::{CustomValidationRule, EngineError, RuleType};

/// A failed rule application, message already localized.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleViolation {
    pub rule_slug: String,
    pub attribute: String,
    pub message: String,
}

/// Evaluates a rule against one cell value. `Ok(true)` means the value
/// passes.
pub fn evaluate(rule: &CustomValidationRule, value: &str) -> Result<bool, EngineError> {
    match rule.rule_type {
        RuleType::Regex => {
            let pattern = rule
                .config
                .get("pattern")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    EngineError::invalid_config(format!(
                        "Rule '{}' is missing config.pattern",
                        rule.slug
                    ))
                })?;
            let regex = Regex::new(pattern).map_err(|e| {
                EngineError::invalid_config(format!("Rule '{}' pattern: {}", rule.slug, e))
            })?;
            Ok(regex.is_match(value))
        }
        RuleType::Expression => evaluate_expression(rule, value),
    }
}

/// Applies a rule and renders the localized violation on failure.
pub fn check(
    rule: &CustomValidationRule,
    attribute: &str,
    value: &str,
    locale_chain: &[&str],
) -> Result<Option<RuleViolation>, EngineError> {
    if evaluate(rule, value)? {
        return Ok(None);
    }
    Ok(Some(RuleViolation {
        rule_slug: rule.slug.clone(),
        attribute: attribute.to_string(),
        message: rule.render_message(locale_chain, attribute, value),
    }))
}

fn evaluate_expression(rule: &CustomValidationRule, value: &str) -> Result<bool, EngineError> {
    let op = rule
        .config
        .get("op")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            EngineError::invalid_config(format!("Rule '{}' is missing config.op", rule.slug))
        })?;
    let expected = rule.config.get("value").ok_or_else(|| {
        EngineError::invalid_config(format!("Rule '{}' is missing config.value", rule.slug))
    })?;

    let result = match op {
        "eq" => compare(value, expected) == Some(std::cmp::Ordering::Equal),
        "ne" => compare(value, expected) != Some(std::cmp::Ordering::Equal),
        "gt" => compare(value, expected) == Some(std::cmp::Ordering::Greater),
        "gte" => matches!(
            compare(value, expected),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        "lt" => compare(value, expected) == Some(std::cmp::Ordering::Less),
        "lte" => matches!(
            compare(value, expected),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        "len_min" => {
            let min = expected.as_u64().unwrap_or(0) as usize;
            value.chars().count() >= min
        }
        "len_max" => {
            let max = expected.as_u64().unwrap_or(u64::MAX) as usize;
            value.chars().count() <= max
        }
        "in" => expected
            .as_array()
            .map(|options| {
                options
                    .iter()
                    .any(|option| option.as_str() == Some(value) || option.to_string() == value)
            })
            .unwrap_or(false),
        other => {
            return Err(EngineError::invalid_config(format!(
                "Rule '{}' has unknown operator '{}'",
                rule.slug, other
            )))
        }
    };
    Ok(result)
}

/// Numeric comparison when both sides are numbers, lexicographic otherwise.
fn compare(value: &str, expected: &Value) -> Option<std::cmp::Ordering> {
    let expected_num = match expected {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    if let (Ok(lhs), Some(rhs)) = (value.parse::<f64>(), expected_num) {
        return lhs.partial_cmp(&rhs);
    }
    let expected_str = match expected {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    Some(value.cmp(expected_str.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn regex_rule(pattern: &str) -> CustomValidationRule {
        CustomValidationRule::new("code-format".into(), RuleType::Regex, json!({"pattern": pattern}))
            .with_translation("en", ":attribute has invalid format: :value")
    }

    fn expr_rule(op: &str, value: Value) -> CustomValidationRule {
        CustomValidationRule::new(
            "amount-check".into(),
            RuleType::Expression,
            json!({"op": op, "value": value}),
        )
        .with_translation("en", ":attribute failed the :op check")
        .with_placeholder("en", "op", op)
    }

    #[test]
    fn regex_rules_match_and_miss() {
        let rule = regex_rule(r"^INV-\d{4}$");
        assert!(evaluate(&rule, "INV-2026").unwrap());
        assert!(!evaluate(&rule, "2026-INV").unwrap());
    }

    #[test]
    fn numeric_comparison_wins_over_lexicographic() {
        let rule = expr_rule("gt", json!(9));
        // Lexicographically "10" < "9"; numerically 10 > 9.
        assert!(evaluate(&rule, "10").unwrap());
        assert!(!evaluate(&rule, "3").unwrap());
    }

    #[test]
    fn in_operator_accepts_listed_values() {
        let rule = expr_rule("in", json!(["invoice", "receipt"]));
        assert!(evaluate(&rule, "invoice").unwrap());
        assert!(!evaluate(&rule, "memo").unwrap());
    }

    #[test]
    fn length_bounds() {
        assert!(evaluate(&expr_rule("len_min", json!(3)), "abc").unwrap());
        assert!(!evaluate(&expr_rule("len_min", json!(4)), "abc").unwrap());
        assert!(evaluate(&expr_rule("len_max", json!(3)), "abc").unwrap());
        assert!(!evaluate(&expr_rule("len_max", json!(2)), "abc").unwrap());
    }

    #[test]
    fn violations_render_localized_messages() {
        let rule = expr_rule("gte", json!(0));
        let violation = check(&rule, "amount", "-1", &["en"]).unwrap().unwrap();
        assert_eq!(violation.message, "amount failed the gte check");
        assert_eq!(violation.rule_slug, "amount-check");
        assert!(check(&rule, "amount", "5", &["en"]).unwrap().is_none());
    }

    #[test]
    fn unknown_operator_is_a_configuration_error() {
        let rule = expr_rule("xor", json!(1));
        assert!(evaluate(&rule, "1").is_err());
    }
}
