// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Campaign Entity
//!
//! A campaign is a user-authored pipeline template: an ordered list of
//! processor steps plus the constraints documents must satisfy to enter it
//! (mime types, size limits, concurrency, retention).
//!
//! ## Invariants
//!
//! - `pipeline_config.processors` is a non-empty ordered list
//! - each step `id` is unique within the list
//! - every step `type` must resolve in the processor registry (checked by
//!   the importer, which owns registry access)
//!
//! At job creation the campaign's `pipeline_config` is frozen into the job's
//! `pipeline_snapshot`, so later edits to the campaign never mutate in-flight
//! jobs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;
use crate::value_objects::CampaignId;

/// Default maximum upload size: 10 MiB.
pub const DEFAULT_MAX_FILE_SIZE_BYTES: i64 = 10_485_760;
/// Default per-campaign concurrent job limit.
pub const DEFAULT_MAX_CONCURRENT_JOBS: i64 = 10;
/// Default document retention in days.
pub const DEFAULT_RETENTION_DAYS: i64 = 90;

/// Campaign flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    Template,
    Custom,
    Meta,
}

impl CampaignType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignType::Template => "template",
            CampaignType::Custom => "custom",
            CampaignType::Meta => "meta",
        }
    }
}

impl std::str::FromStr for CampaignType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "template" => Ok(CampaignType::Template),
            "custom" => Ok(CampaignType::Custom),
            "meta" => Ok(CampaignType::Meta),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown campaign type: {}",
                s
            ))),
        }
    }
}

/// Campaign publication state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignState {
    Draft,
    Active,
    Paused,
    Archived,
}

impl CampaignState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignState::Draft => "draft",
            CampaignState::Active => "active",
            CampaignState::Paused => "paused",
            CampaignState::Archived => "archived",
        }
    }
}

impl std::str::FromStr for CampaignState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignState::Draft),
            "active" => Ok(CampaignState::Active),
            "paused" => Ok(CampaignState::Paused),
            "archived" => Ok(CampaignState::Archived),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown campaign state: {}",
                s
            ))),
        }
    }
}

/// One step of a pipeline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Unique step identifier within the pipeline.
    pub id: String,
    /// Processor slug resolved through the registry.
    #[serde(rename = "type")]
    pub processor_type: String,
    /// Step configuration, validated against the processor's config schema.
    #[serde(default = "empty_object")]
    pub config: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// The ordered pipeline a campaign runs documents through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub processors: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Validates the structural invariants: non-empty, unique step ids.
    ///
    /// Registry resolution of step types is the importer's responsibility;
    /// this entity only knows its own shape.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.processors.is_empty() {
            return Err(EngineError::importer_error(
                "processors",
                "must be a non-empty list",
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for (index, step) in self.processors.iter().enumerate() {
            if step.id.is_empty() {
                return Err(EngineError::importer_error(
                    format!("processors[{}].id", index),
                    "must not be empty",
                ));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(EngineError::importer_error(
                    format!("processors[{}].id", index),
                    "duplicate",
                ));
            }
            if !step.config.is_object() {
                return Err(EngineError::importer_error(
                    format!("processors[{}].config", index),
                    "must be an object",
                ));
            }
        }
        Ok(())
    }

    pub fn step_count(&self) -> usize {
        self.processors.len()
    }

    pub fn step_at(&self, index: usize) -> Option<&PipelineStep> {
        self.processors.get(index)
    }
}

/// Checklist entry shown to reviewers alongside processed documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub label: String,
    #[serde(default)]
    pub required: bool,
}

/// Free-form campaign settings with typed accessors for the keys the engine
/// reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A pipeline template owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    id: CampaignId,
    slug: String,
    name: String,
    description: Option<String>,
    kind: CampaignType,
    state: CampaignState,
    pipeline_config: PipelineConfig,
    settings: CampaignSettings,
    allowed_mime_types: Vec<String>,
    max_file_size_bytes: i64,
    max_concurrent_jobs: i64,
    retention_days: i64,
    checklist_template: Option<Vec<ChecklistItem>>,
    credentials: Option<String>,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Builder-style construction parameters for a campaign.
///
/// The importer materializes one of these from a validated definition; the
/// entity constructor applies defaults and re-checks invariants.
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: CampaignType,
    pub state: CampaignState,
    pub pipeline_config: PipelineConfig,
    pub settings: CampaignSettings,
    pub allowed_mime_types: Vec<String>,
    pub max_file_size_bytes: Option<i64>,
    pub max_concurrent_jobs: Option<i64>,
    pub retention_days: Option<i64>,
    pub checklist_template: Option<Vec<ChecklistItem>>,
}

impl Campaign {
    /// Creates a campaign from a validated draft, applying platform defaults.
    pub fn from_draft(draft: CampaignDraft) -> Result<Self, EngineError> {
        if draft.name.is_empty() {
            return Err(EngineError::importer_error("name", "must not be empty"));
        }
        draft.pipeline_config.validate()?;

        let now = chrono::Utc::now();
        let published_at = match draft.state {
            CampaignState::Active => Some(now),
            _ => None,
        };

        Ok(Campaign {
            id: CampaignId::new(),
            slug: draft.slug,
            name: draft.name,
            description: draft.description,
            kind: draft.kind,
            state: draft.state,
            pipeline_config: draft.pipeline_config,
            settings: draft.settings,
            allowed_mime_types: draft.allowed_mime_types,
            max_file_size_bytes: draft.max_file_size_bytes.unwrap_or(DEFAULT_MAX_FILE_SIZE_BYTES),
            max_concurrent_jobs: draft.max_concurrent_jobs.unwrap_or(DEFAULT_MAX_CONCURRENT_JOBS),
            retention_days: draft.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS),
            checklist_template: draft.checklist_template,
            credentials: None,
            published_at,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrates a campaign from persisted fields without re-validation.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: CampaignId,
        slug: String,
        name: String,
        description: Option<String>,
        kind: CampaignType,
        state: CampaignState,
        pipeline_config: PipelineConfig,
        settings: CampaignSettings,
        allowed_mime_types: Vec<String>,
        max_file_size_bytes: i64,
        max_concurrent_jobs: i64,
        retention_days: i64,
        checklist_template: Option<Vec<ChecklistItem>>,
        credentials: Option<String>,
        published_at: Option<chrono::DateTime<chrono::Utc>>,
        created_at: chrono::DateTime<chrono::Utc>,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Self {
        Campaign {
            id,
            slug,
            name,
            description,
            kind,
            state,
            pipeline_config,
            settings,
            allowed_mime_types,
            max_file_size_bytes,
            max_concurrent_jobs,
            retention_days,
            checklist_template,
            credentials,
            published_at,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> CampaignId {
        self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn kind(&self) -> CampaignType {
        self.kind
    }

    pub fn state(&self) -> CampaignState {
        self.state
    }

    pub fn pipeline_config(&self) -> &PipelineConfig {
        &self.pipeline_config
    }

    pub fn settings(&self) -> &CampaignSettings {
        &self.settings
    }

    pub fn allowed_mime_types(&self) -> &[String] {
        &self.allowed_mime_types
    }

    pub fn max_file_size_bytes(&self) -> i64 {
        self.max_file_size_bytes
    }

    pub fn max_concurrent_jobs(&self) -> i64 {
        self.max_concurrent_jobs
    }

    pub fn retention_days(&self) -> i64 {
        self.retention_days
    }

    pub fn checklist_template(&self) -> Option<&[ChecklistItem]> {
        self.checklist_template.as_deref()
    }

    pub fn published_at(&self) -> Option<&chrono::DateTime<chrono::Utc>> {
        self.published_at.as_ref()
    }

    pub fn created_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.created_at
    }

    pub fn updated_at(&self) -> &chrono::DateTime<chrono::Utc> {
        &self.updated_at
    }

    /// Checks whether a mime type is accepted by this campaign.
    ///
    /// An empty allow-list means the platform-wide default applies and the
    /// check is delegated to the caller's configuration.
    pub fn accepts_mime_type(&self, mime_type: &str) -> bool {
        self.allowed_mime_types.is_empty()
            || self.allowed_mime_types.iter().any(|m| m == mime_type)
    }

    /// Checks an upload size against the campaign limit.
    pub fn accepts_file_size(&self, size_bytes: i64) -> bool {
        size_bytes <= self.max_file_size_bytes
    }

    /// Freezes the pipeline configuration for a new job.
    pub fn snapshot_pipeline(&self) -> PipelineConfig {
        self.pipeline_config.clone()
    }
}

/// Derives a URL-safe slug from a campaign name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: &str, processor_type: &str) -> PipelineStep {
        PipelineStep {
            id: id.into(),
            processor_type: processor_type.into(),
            config: json!({}),
        }
    }

    fn draft(config: PipelineConfig) -> CampaignDraft {
        CampaignDraft {
            slug: "invoices".into(),
            name: "Invoices".into(),
            description: None,
            kind: CampaignType::Custom,
            state: CampaignState::Active,
            pipeline_config: config,
            settings: CampaignSettings::default(),
            allowed_mime_types: vec!["application/pdf".into()],
            max_file_size_bytes: None,
            max_concurrent_jobs: None,
            retention_days: None,
            checklist_template: None,
        }
    }

    #[test]
    fn empty_pipeline_is_rejected() {
        let err = PipelineConfig { processors: vec![] }.validate().unwrap_err();
        match err {
            EngineError::ImporterValidationError { field, .. } => assert_eq!(field, "processors"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn duplicate_step_ids_are_rejected_with_the_offending_index() {
        let config = PipelineConfig {
            processors: vec![step("a", "ocr"), step("a", "classification")],
        };
        let err = config.validate().unwrap_err();
        match err {
            EngineError::ImporterValidationError { field, reason } => {
                assert_eq!(field, "processors[1].id");
                assert_eq!(reason, "duplicate");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn defaults_are_applied_from_draft() {
        let campaign = Campaign::from_draft(draft(PipelineConfig {
            processors: vec![step("ocr", "ocr")],
        }))
        .unwrap();
        assert_eq!(campaign.max_file_size_bytes(), DEFAULT_MAX_FILE_SIZE_BYTES);
        assert_eq!(campaign.max_concurrent_jobs(), DEFAULT_MAX_CONCURRENT_JOBS);
        assert_eq!(campaign.retention_days(), DEFAULT_RETENTION_DAYS);
        assert!(campaign.published_at().is_some());
    }

    #[test]
    fn mime_and_size_gates() {
        let campaign = Campaign::from_draft(draft(PipelineConfig {
            processors: vec![step("ocr", "ocr")],
        }))
        .unwrap();
        assert!(campaign.accepts_mime_type("application/pdf"));
        assert!(!campaign.accepts_mime_type("text/csv"));
        assert!(campaign.accepts_file_size(17));
        assert!(!campaign.accepts_file_size(DEFAULT_MAX_FILE_SIZE_BYTES + 1));
    }

    #[test]
    fn step_type_field_round_trips_as_type() {
        let parsed: PipelineStep =
            serde_json::from_value(json!({"id": "ocr", "type": "ocr", "config": {"lang": "eng"}}))
                .unwrap();
        assert_eq!(parsed.processor_type, "ocr");
        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["type"], "ocr");
    }

    #[test]
    fn slugify_flattens_punctuation() {
        assert_eq!(slugify("Invoice Intake (EU)"), "invoice-intake-eu");
        assert_eq!(slugify("  Receipts  "), "receipts");
    }

    proptest::proptest! {
        #[test]
        fn slugify_output_is_always_url_safe(name in ".*") {
            let slug = slugify(&name);
            proptest::prop_assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            proptest::prop_assert!(!slug.starts_with('-'));
            proptest::prop_assert!(!slug.ends_with('-'));
        }

        #[test]
        fn slugify_is_idempotent(name in ".*") {
            let once = slugify(&name);
            proptest::prop_assert_eq!(slugify(&once), once);
        }
    }
}
