// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Campaign Definition Importer
//!
//! Validates and materializes a pipeline definition into the tenant
//! database. Definitions arrive from a file (JSON or YAML by extension),
//! STDIN, or an inline string; on conflict the priority is
//! inline > STDIN > file.
//!
//! Validation is field-level: every failure names the offending path
//! (`processors[1].id`) and a reason, and nothing is persisted unless the
//! whole definition passes. `validate_only` runs every check without
//! writing.

use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use docuflow_domain::entities::campaign::{slugify, CampaignSettings, ChecklistItem};
use docuflow_domain::repositories::{AuditLedger, CampaignRepository, ProcessorRecordRepository};
use docuflow_domain::{
    AuditEntry, Campaign, CampaignDraft, CampaignState, CampaignType, EngineError, PipelineConfig,
    PipelineStep,
};

use crate::infrastructure::registry::processor_registry::ProcessorRegistry;
use crate::infrastructure::validation::output_validator;

/// Where a definition came from, in ascending priority.
#[derive(Debug, Clone, Default)]
pub struct DefinitionSource {
    /// Path to a `.json` / `.yaml` / `.yml` file.
    pub file: Option<String>,
    /// Raw STDIN capture, when the caller piped one in.
    pub stdin: Option<String>,
    /// Inline definition string.
    pub inline: Option<String>,
}

/// Outcome of a successful import or validation run.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub slug: String,
    pub persisted: bool,
}

/// Raw deserialization target; everything optional so missing fields
/// produce field-level errors instead of serde errors.
#[derive(Debug, Deserialize)]
struct CampaignDefinition {
    name: Option<String>,
    slug: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    state: Option<String>,
    processors: Option<Vec<StepDefinition>>,
    #[serde(default)]
    settings: Option<CampaignSettings>,
    allowed_mime_types: Option<Vec<String>>,
    max_file_size_bytes: Option<i64>,
    max_concurrent_jobs: Option<i64>,
    retention_days: Option<i64>,
    checklist_template: Option<Vec<ChecklistItem>>,
}

#[derive(Debug, Deserialize)]
struct StepDefinition {
    id: Option<String>,
    #[serde(rename = "type")]
    processor_type: Option<String>,
    config: Option<Value>,
}

/// The importer service.
pub struct CampaignImporter {
    campaigns: Arc<dyn CampaignRepository>,
    processor_records: Arc<dyn ProcessorRecordRepository>,
    audit: Arc<dyn AuditLedger>,
    registry: Arc<ProcessorRegistry>,
}

impl CampaignImporter {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        processor_records: Arc<dyn ProcessorRecordRepository>,
        audit: Arc<dyn AuditLedger>,
        registry: Arc<ProcessorRegistry>,
    ) -> Self {
        Self {
            campaigns,
            processor_records,
            audit,
            registry,
        }
    }

    /// Imports (or merely validates) a definition. Must run under the
    /// target tenant's binding.
    pub async fn import(
        &self,
        source: &DefinitionSource,
        validate_only: bool,
    ) -> Result<ImportOutcome, EngineError> {
        let raw = Self::read_source(source).await?;
        let definition = Self::parse(&raw)?;
        let draft = self.validate(definition).await?;
        let slug = draft.slug.clone();

        if validate_only {
            info!(slug = %slug, "Campaign definition valid (validate-only)");
            return Ok(ImportOutcome {
                slug,
                persisted: false,
            });
        }

        let campaign = Campaign::from_draft(draft)?;
        self.campaigns.insert(&campaign).await?;
        self.audit
            .append(
                &AuditEntry::new("campaign", campaign.id().to_string(), "imported")
                    .tagged("importer"),
            )
            .await?;
        info!(slug = %slug, id = %campaign.id(), "Campaign materialized");

        Ok(ImportOutcome {
            slug,
            persisted: true,
        })
    }

    /// Resolves the definition text by priority: inline > STDIN > file.
    async fn read_source(source: &DefinitionSource) -> Result<RawDefinition, EngineError> {
        if let Some(inline) = &source.inline {
            return Ok(RawDefinition {
                text: inline.clone(),
                format: Format::Unknown,
            });
        }
        if let Some(stdin) = &source.stdin {
            return Ok(RawDefinition {
                text: stdin.clone(),
                format: Format::Unknown,
            });
        }
        if let Some(path) = &source.file {
            let format = if path.ends_with(".json") {
                Format::Json
            } else if path.ends_with(".yaml") || path.ends_with(".yml") {
                Format::Yaml
            } else {
                Format::Unknown
            };
            let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                EngineError::IoError(format!("cannot read definition '{}': {}", path, e))
            })?;
            return Ok(RawDefinition { text, format });
        }
        Err(EngineError::importer_error(
            "definition",
            "no definition supplied (expected --file, STDIN, or --inline)",
        ))
    }

    fn parse(raw: &RawDefinition) -> Result<CampaignDefinition, EngineError> {
        let parse_json = |text: &str| {
            serde_json::from_str::<CampaignDefinition>(text)
                .map_err(|e| EngineError::importer_error("definition", format!("JSON parse: {}", e)))
        };
        let parse_yaml = |text: &str| {
            serde_yaml::from_str::<CampaignDefinition>(text)
                .map_err(|e| EngineError::importer_error("definition", format!("YAML parse: {}", e)))
        };
        match raw.format {
            Format::Json => parse_json(&raw.text),
            Format::Yaml => parse_yaml(&raw.text),
            Format::Unknown => parse_json(&raw.text).or_else(|_| parse_yaml(&raw.text)),
        }
    }

    /// Full structural and semantic validation into a draft.
    async fn validate(&self, definition: CampaignDefinition) -> Result<CampaignDraft, EngineError> {
        let name = definition
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EngineError::importer_error("name", "required"))?;

        let kind = definition
            .kind
            .ok_or_else(|| EngineError::importer_error("type", "required"))
            .and_then(|k| {
                CampaignType::from_str(&k).map_err(|_| {
                    EngineError::importer_error(
                        "type",
                        format!("'{}' is not one of template, custom, meta", k),
                    )
                })
            })?;

        let state = definition
            .state
            .ok_or_else(|| EngineError::importer_error("state", "required"))
            .and_then(|s| {
                CampaignState::from_str(&s).map_err(|_| {
                    EngineError::importer_error(
                        "state",
                        format!("'{}' is not one of draft, active, paused, archived", s),
                    )
                })
            })?;

        let steps = definition
            .processors
            .filter(|p| !p.is_empty())
            .ok_or_else(|| EngineError::importer_error("processors", "must be a non-empty list"))?;

        let mut seen_ids = std::collections::HashSet::new();
        let mut processors = Vec::with_capacity(steps.len());
        for (index, step) in steps.into_iter().enumerate() {
            let id = step
                .id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    EngineError::importer_error(format!("processors[{}].id", index), "required")
                })?;
            if !seen_ids.insert(id.clone()) {
                return Err(EngineError::importer_error(
                    format!("processors[{}].id", index),
                    "duplicate",
                ));
            }
            let processor_type = step.processor_type.filter(|t| !t.is_empty()).ok_or_else(|| {
                EngineError::importer_error(format!("processors[{}].type", index), "required")
            })?;

            self.ensure_type_resolves(&processor_type, index).await?;

            let config = step.config.unwrap_or_else(|| Value::Object(Default::default()));
            if !config.is_object() {
                return Err(EngineError::importer_error(
                    format!("processors[{}].config", index),
                    "must be an object",
                ));
            }
            // Validate the config against the processor's declared schema
            // when the implementation is loaded.
            if let Some(processor) = self.registry.resolve(&processor_type) {
                if let Err(error) =
                    output_validator::validate_config(&processor.describe().config_schema, &config)
                {
                    return Err(EngineError::importer_error(
                        format!("processors[{}].config", index),
                        error.to_string(),
                    ));
                }
            }

            processors.push(PipelineStep {
                id,
                processor_type,
                config,
            });
        }

        let slug = match definition.slug {
            Some(slug) if !slug.is_empty() => {
                if self.campaigns.slug_exists(&slug).await? {
                    return Err(EngineError::importer_error(
                        "slug",
                        format!("'{}' already exists for this tenant", slug),
                    ));
                }
                slug
            }
            _ => {
                let derived = slugify(&name);
                if derived.is_empty() {
                    return Err(EngineError::importer_error(
                        "slug",
                        "cannot derive a slug from the name",
                    ));
                }
                if self.campaigns.slug_exists(&derived).await? {
                    return Err(EngineError::importer_error(
                        "slug",
                        format!("derived slug '{}' already exists for this tenant", derived),
                    ));
                }
                derived
            }
        };

        Ok(CampaignDraft {
            slug,
            name,
            description: definition.description,
            kind,
            state,
            pipeline_config: PipelineConfig { processors },
            settings: definition.settings.unwrap_or_default(),
            allowed_mime_types: definition.allowed_mime_types.unwrap_or_default(),
            max_file_size_bytes: definition.max_file_size_bytes,
            max_concurrent_jobs: definition.max_concurrent_jobs,
            retention_days: definition.retention_days,
            checklist_template: definition.checklist_template,
        })
    }

    /// A step type must resolve in the registry, directly or through the
    /// tenant's processors table.
    async fn ensure_type_resolves(&self, slug: &str, index: usize) -> Result<(), EngineError> {
        if self.registry.contains(slug) {
            return Ok(());
        }
        if self.processor_records.find_by_slug(slug).await?.is_some() {
            return Ok(());
        }
        Err(EngineError::importer_error(
            format!("processors[{}].type", index),
            format!(
                "unknown processor type '{}' (registered: {})",
                slug,
                self.registry.slugs().join(", ")
            ),
        ))
    }
}

struct RawDefinition {
    text: String,
    format: Format,
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Json,
    Yaml,
    Unknown,
}
