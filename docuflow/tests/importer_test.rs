// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Campaign importer scenarios: field-level rejection, source priority,
//! YAML input, slug derivation, and validate-only.

mod common;

use common::*;
use serde_json::json;

use docuflow::application::use_cases::import_campaign::DefinitionSource;
use docuflow_domain::repositories::CampaignRepository;
use docuflow_domain::EngineError;

async fn try_import(
    fixture: &TestEngine,
    source: DefinitionSource,
    validate_only: bool,
) -> Result<docuflow::application::use_cases::import_campaign::ImportOutcome, EngineError> {
    let importer = fixture.engine.importer();
    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), importer.import(&source, validate_only))
        .await
}

fn inline(definition: serde_json::Value) -> DefinitionSource {
    DefinitionSource {
        inline: Some(definition.to_string()),
        ..Default::default()
    }
}

/// A duplicate step id is rejected at the offending index and nothing
/// is persisted.
#[tokio::test]
async fn duplicate_step_ids_are_rejected_field_level() {
    let fixture = test_engine("acme").await;
    let err = try_import(
        &fixture,
        inline(json!({
            "name": "X",
            "type": "custom",
            "state": "draft",
            "processors": [
                { "id": "a", "type": "ocr", "config": {} },
                { "id": "a", "type": "classification", "config": {} }
            ]
        })),
        false,
    )
    .await
    .unwrap_err();

    match err {
        EngineError::ImporterValidationError { field, reason } => {
            assert_eq!(field, "processors[1].id");
            assert_eq!(reason, "duplicate");
        }
        other => panic!("unexpected variant: {other:?}"),
    }

    let rows = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), fixture.engine.campaigns.list())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

/// Unknown processor types are rejected with the registered slugs listed.
#[tokio::test]
async fn unknown_processor_type_is_rejected() {
    let fixture = test_engine("acme").await;
    let err = try_import(
        &fixture,
        inline(json!({
            "name": "X",
            "type": "custom",
            "state": "draft",
            "processors": [{ "id": "a", "type": "telepathy", "config": {} }]
        })),
        false,
    )
    .await
    .unwrap_err();

    match err {
        EngineError::ImporterValidationError { field, reason } => {
            assert_eq!(field, "processors[0].type");
            assert!(reason.contains("unknown processor type 'telepathy'"));
            assert!(reason.contains("ocr"));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}

/// Missing required fields name their path.
#[tokio::test]
async fn missing_required_fields_are_named() {
    let fixture = test_engine("acme").await;
    for (definition, expected_field) in [
        (json!({"type": "custom", "state": "draft", "processors": [{"id": "a", "type": "ocr"}]}), "name"),
        (json!({"name": "X", "state": "draft", "processors": [{"id": "a", "type": "ocr"}]}), "type"),
        (json!({"name": "X", "type": "custom", "processors": [{"id": "a", "type": "ocr"}]}), "state"),
        (json!({"name": "X", "type": "custom", "state": "draft", "processors": []}), "processors"),
    ] {
        let err = try_import(&fixture, inline(definition), false).await.unwrap_err();
        match err {
            EngineError::ImporterValidationError { field, .. } => assert_eq!(field, expected_field),
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}

/// Priority on conflicting sources: inline > STDIN > file.
#[tokio::test]
async fn inline_beats_stdin_beats_file() {
    let fixture = test_engine("acme").await;
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("campaign.json");
    std::fs::write(
        &file_path,
        json!({
            "name": "From File",
            "type": "custom",
            "state": "draft",
            "processors": [{ "id": "a", "type": "ocr", "config": {} }]
        })
        .to_string(),
    )
    .unwrap();

    let stdin_definition = json!({
        "name": "From Stdin",
        "type": "custom",
        "state": "draft",
        "processors": [{ "id": "a", "type": "ocr", "config": {} }]
    });
    let inline_definition = json!({
        "name": "From Inline",
        "type": "custom",
        "state": "draft",
        "processors": [{ "id": "a", "type": "ocr", "config": {} }]
    });

    let outcome = try_import(
        &fixture,
        DefinitionSource {
            file: Some(file_path.display().to_string()),
            stdin: Some(stdin_definition.to_string()),
            inline: Some(inline_definition.to_string()),
        },
        false,
    )
    .await
    .unwrap();
    assert_eq!(outcome.slug, "from-inline");

    let outcome = try_import(
        &fixture,
        DefinitionSource {
            file: Some(file_path.display().to_string()),
            stdin: Some(stdin_definition.to_string()),
            inline: None,
        },
        false,
    )
    .await
    .unwrap();
    assert_eq!(outcome.slug, "from-stdin");

    let outcome = try_import(
        &fixture,
        DefinitionSource {
            file: Some(file_path.display().to_string()),
            stdin: None,
            inline: None,
        },
        false,
    )
    .await
    .unwrap();
    assert_eq!(outcome.slug, "from-file");
}

/// YAML definitions parse from files by extension.
#[tokio::test]
async fn yaml_definitions_are_accepted() {
    let fixture = test_engine("acme").await;
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("campaign.yaml");
    std::fs::write(
        &file_path,
        "name: Receipts\ntype: template\nstate: active\nprocessors:\n  - id: ocr\n    type: ocr\n    config:\n      lang: eng\n",
    )
    .unwrap();

    let outcome = try_import(
        &fixture,
        DefinitionSource {
            file: Some(file_path.display().to_string()),
            ..Default::default()
        },
        false,
    )
    .await
    .unwrap();
    assert_eq!(outcome.slug, "receipts");
    assert!(outcome.persisted);
}

/// `--validate-only` runs every check and persists nothing.
#[tokio::test]
async fn validate_only_persists_nothing() {
    let fixture = test_engine("acme").await;
    let outcome = try_import(&fixture, inline(standard_definition("Dry Run")), true)
        .await
        .unwrap();
    assert!(!outcome.persisted);
    assert_eq!(outcome.slug, "dry-run");

    let exists = fixture
        .engine
        .connections
        .with_tenant(
            fixture.tenant.clone(),
            fixture.engine.campaigns.slug_exists("dry-run"),
        )
        .await
        .unwrap();
    assert!(!exists);
}

/// Duplicate slugs within a tenant are rejected; the derived slug counts.
#[tokio::test]
async fn slugs_are_unique_per_tenant() {
    let fixture = test_engine("acme").await;
    try_import(&fixture, inline(standard_definition("Invoices")), false)
        .await
        .unwrap();
    let err = try_import(&fixture, inline(standard_definition("Invoices")), false)
        .await
        .unwrap_err();
    match err {
        EngineError::ImporterValidationError { field, reason } => {
            assert_eq!(field, "slug");
            assert!(reason.contains("already exists"));
        }
        other => panic!("unexpected variant: {other:?}"),
    }
}
