// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Registered processor metadata.
//!
//! A `ProcessorRecord` is the tenant-database row describing an executable
//! processor implementation: the registry slug, the `class_ref` the lazy
//! loader resolves against the built-in factory table, and the declared
//! config schema. The executable contract itself is the
//! [`crate::services::processor::Processor`] trait.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::value_objects::ProcessorId;

/// Processing category a processor belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorCategory {
    Ocr,
    Classification,
    Extraction,
    Validation,
    Enrichment,
    Notification,
    Storage,
    Other(String),
}

impl ProcessorCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ProcessorCategory::Ocr => "ocr",
            ProcessorCategory::Classification => "classification",
            ProcessorCategory::Extraction => "extraction",
            ProcessorCategory::Validation => "validation",
            ProcessorCategory::Enrichment => "enrichment",
            ProcessorCategory::Notification => "notification",
            ProcessorCategory::Storage => "storage",
            ProcessorCategory::Other(name) => name,
        }
    }
}

impl std::fmt::Display for ProcessorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProcessorCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ocr" => ProcessorCategory::Ocr,
            "classification" => ProcessorCategory::Classification,
            "extraction" => ProcessorCategory::Extraction,
            "validation" => ProcessorCategory::Validation,
            "enrichment" => ProcessorCategory::Enrichment,
            "notification" => ProcessorCategory::Notification,
            "storage" => ProcessorCategory::Storage,
            other => ProcessorCategory::Other(other.to_string()),
        })
    }
}

/// Tenant-registered processor implementation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorRecord {
    pub id: ProcessorId,
    pub slug: String,
    pub name: String,
    pub category: ProcessorCategory,
    pub class_ref: String,
    pub config_schema: Value,
    pub version: String,
    pub is_system: bool,
    pub active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ProcessorRecord {
    pub fn new(
        slug: String,
        name: String,
        category: ProcessorCategory,
        class_ref: String,
        config_schema: Value,
    ) -> Result<Self, EngineError> {
        if slug.is_empty() || slug.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(EngineError::invalid_config(format!(
                "Processor slug '{}' must be non-empty lowercase",
                slug
            )));
        }
        Ok(ProcessorRecord {
            id: ProcessorId::new(),
            slug,
            name,
            category,
            class_ref,
            config_schema,
            version: "1.0.0".to_string(),
            is_system: false,
            active: true,
            created_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn categories_round_trip_including_open_ended_ones() {
        assert_eq!(
            ProcessorCategory::from_str("extraction").unwrap(),
            ProcessorCategory::Extraction
        );
        assert_eq!(
            ProcessorCategory::from_str("webhook").unwrap(),
            ProcessorCategory::Other("webhook".into())
        );
        assert_eq!(ProcessorCategory::Other("webhook".into()).as_str(), "webhook");
    }

    #[test]
    fn slug_must_be_lowercase() {
        assert!(ProcessorRecord::new(
            "Ocr".into(),
            "OCR".into(),
            ProcessorCategory::Ocr,
            "OcrProcessor".into(),
            serde_json::json!({}),
        )
        .is_err());
    }
}
