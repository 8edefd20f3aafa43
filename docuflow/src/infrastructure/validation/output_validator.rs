// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Output Validator
//!
//! JSON-Schema validation of processor results before a step commits. A
//! failure here is classified non-retriable and fails the enclosing job -
//! a processor that produced schema-invalid output once will produce it
//! again, and letting malformed data flow downstream is worse than halting.
//!
//! Error messages name the failing instance path so the job error log is
//! actionable.

use jsonschema::{Draft, Validator};
use serde_json::Value;

use docuflow_domain::EngineError;

/// Compiles a processor's declared output schema.
fn compile_schema(schema: &Value) -> Result<Validator, EngineError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| EngineError::invalid_config(format!("Invalid output schema: {}", err)))
}

/// Validates processor output against its declared schema.
///
/// Returns `OutputValidationFailure` naming the first failing schema paths.
pub fn validate_output(schema: &Value, output: &Value) -> Result<(), EngineError> {
    let validator = compile_schema(schema)?;
    let mut failures: Vec<String> = validator
        .iter_errors(output)
        .map(|error| format!("{} at {}", error, error.instance_path()))
        .collect();
    if failures.is_empty() {
        return Ok(());
    }
    failures.truncate(5);
    Err(EngineError::OutputValidationFailure(failures.join("; ")))
}

/// Validates a step configuration against a processor's config schema.
/// Used by the importer; shares classification with output validation.
pub fn validate_config(schema: &Value, config: &Value) -> Result<(), EngineError> {
    // An empty schema accepts everything; skip the compile.
    if schema.as_object().is_some_and(|m| m.is_empty()) {
        return Ok(());
    }
    let validator = compile_schema(schema)?;
    if let Some(error) = validator.iter_errors(config).next() {
        return Err(EngineError::invalid_config(format!(
            "{} at {}",
            error, error.instance_path()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "required": ["text"],
            "properties": {
                "text": { "type": "string" },
                "confidence": { "type": "number", "minimum": 0, "maximum": 1 }
            }
        })
    }

    #[test]
    fn valid_output_passes() {
        validate_output(&schema(), &json!({"text": "hello", "confidence": 0.9})).unwrap();
    }

    #[test]
    fn missing_required_field_names_the_path() {
        let err = validate_output(&schema(), &json!({"confidence": 0.9})).unwrap_err();
        match err {
            EngineError::OutputValidationFailure(message) => {
                assert!(message.contains("text"), "message was: {message}");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn structurally_valid_but_schema_invalid_output_fails() {
        let err =
            validate_output(&schema(), &json!({"text": "ok", "confidence": 7.5})).unwrap_err();
        assert!(matches!(err, EngineError::OutputValidationFailure(_)));
    }

    #[test]
    fn empty_config_schema_accepts_anything() {
        validate_config(&json!({}), &json!({"whatever": [1, 2, 3]})).unwrap();
    }
}
