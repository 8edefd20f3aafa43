// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end orchestrator scenarios: the happy path, retriable and fatal
//! failures, output-schema rejection, step ordering, idempotence, and
//! cancellation - all through the real queue, worker, repositories, and
//! tenant binding.

mod common;

use common::*;
use serde_json::json;

use docuflow_domain::repositories::{
    DocumentRepository, ExecutionRepository, JobRepository, ProgressRepository, UsageLedger,
};
use docuflow_domain::services::{FailureKind, ProcessorOutcome};
use docuflow_domain::{DocumentState, EngineError, ExecutionState, JobState, UsageEventType};

/// Happy path: a three-stage pipeline runs a 17-byte PDF to completion.
#[tokio::test]
async fn three_stage_pipeline_completes() {
    let fixture = test_engine("acme").await;
    let slug = import_campaign(&fixture, standard_definition("Invoices")).await;
    let receipt = upload_tiny_pdf(&fixture, &slug).await;

    drive_to_idle(&fixture).await;

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let document = fixture
                .engine
                .documents
                .find_by_uuid(receipt.document_uuid)
                .await?
                .unwrap();
            assert_eq!(document.state(), DocumentState::Completed);
            assert_eq!(document.processing_history().len(), 3);
            // Metadata deltas from each stage landed on the document.
            assert_eq!(document.metadata()["category"], "invoice");
            assert_eq!(document.metadata()["ocr_lang"], "eng");

            let job = fixture
                .engine
                .jobs
                .find_by_uuid(receipt.job_uuid)
                .await?
                .unwrap();
            assert_eq!(job.state(), JobState::Completed);
            assert_eq!(job.current_step_index(), 3);

            let executions = fixture.engine.executions.list_for_job(job.id()).await?;
            assert_eq!(executions.len(), 3);
            let order: Vec<&str> = executions.iter().map(|e| e.step_id()).collect();
            assert_eq!(order, vec!["ocr", "cls", "ext"]);
            assert!(executions
                .iter()
                .all(|e| e.state() == ExecutionState::Completed));

            let progress = fixture.engine.progress.find(job.id()).await?.unwrap();
            assert_eq!(progress.percentage_complete, 100.0);
            assert_eq!(progress.completed_stages, 3);

            let uploads = fixture
                .engine
                .usage
                .count_by_type(UsageEventType::Upload)
                .await?;
            let executions_metered = fixture
                .engine
                .usage
                .count_by_type(UsageEventType::ProcessorExecution)
                .await?;
            assert_eq!(uploads, 1);
            assert_eq!(executions_metered, 3);
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();

    let names = fixture.events.names();
    assert_eq!(names.iter().filter(|n| **n == "document_completed").count(), 1);
    assert_eq!(names.iter().filter(|n| **n == "step_completed").count(), 2);
}

/// Two retriable failures then success, within the default budget of
/// three attempts; downstream steps run exactly once.
#[tokio::test]
async fn retriable_failure_retries_then_succeeds() {
    let fixture = test_engine("acme").await;
    fixture.engine.registry.register(ScriptedProcessor::new(
        "flaky",
        vec![
            ProcessorOutcome::failure(FailureKind::Execution, "transient remote error", true),
            ProcessorOutcome::failure(FailureKind::Execution, "transient remote error", true),
            ProcessorOutcome::success(json!({"recovered": true})),
        ],
    ));
    fixture
        .engine
        .registry
        .register(ScriptedProcessor::new("after", vec![]));

    let slug = import_campaign(
        &fixture,
        json!({
            "name": "Flaky Pipeline",
            "type": "custom",
            "state": "active",
            "processors": [
                { "id": "flaky", "type": "flaky", "config": {} },
                { "id": "after", "type": "after", "config": {} }
            ]
        }),
    )
    .await;
    let receipt = upload_tiny_pdf(&fixture, &slug).await;

    drive_to_idle(&fixture).await;

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let job = fixture
                .engine
                .jobs
                .find_by_uuid(receipt.job_uuid)
                .await?
                .unwrap();
            assert_eq!(job.state(), JobState::Completed);

            let executions = fixture.engine.executions.list_for_job(job.id()).await?;
            let flaky: Vec<_> = executions.iter().filter(|e| e.step_id() == "flaky").collect();
            assert_eq!(flaky.len(), 3);
            assert_eq!(flaky[0].state(), ExecutionState::Failed);
            assert_eq!(flaky[1].state(), ExecutionState::Failed);
            assert_eq!(flaky[2].state(), ExecutionState::Completed);
            assert_eq!(
                flaky.iter().map(|e| e.attempt()).collect::<Vec<_>>(),
                vec![1, 2, 3]
            );

            let after: Vec<_> = executions.iter().filter(|e| e.step_id() == "after").collect();
            assert_eq!(after.len(), 1);
            assert_eq!(after[0].state(), ExecutionState::Completed);

            // The retries were logged without terminalizing the job.
            assert_eq!(job.error_log().len(), 2);
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();
}

/// A non-retriable failure on step 2 fails the job; step 3 never
/// executes.
#[tokio::test]
async fn fatal_failure_halts_the_pipeline() {
    let fixture = test_engine("acme").await;
    fixture
        .engine
        .registry
        .register(ScriptedProcessor::new("ok", vec![]));
    fixture.engine.registry.register(ScriptedProcessor::new(
        "fatal",
        vec![ProcessorOutcome::failure(
            FailureKind::InvalidInput,
            "unsupported layout",
            false,
        )],
    ));
    fixture
        .engine
        .registry
        .register(ScriptedProcessor::new("never", vec![]));

    let slug = import_campaign(
        &fixture,
        json!({
            "name": "Fatal Pipeline",
            "type": "custom",
            "state": "active",
            "processors": [
                { "id": "ok", "type": "ok", "config": {} },
                { "id": "fatal", "type": "fatal", "config": {} },
                { "id": "never", "type": "never", "config": {} }
            ]
        }),
    )
    .await;
    let receipt = upload_tiny_pdf(&fixture, &slug).await;

    drive_to_idle(&fixture).await;

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let job = fixture
                .engine
                .jobs
                .find_by_uuid(receipt.job_uuid)
                .await?
                .unwrap();
            assert_eq!(job.state(), JobState::Failed);
            assert_eq!(job.error_log().len(), 1);
            assert!(job.error_log()[0].message.contains("unsupported layout"));

            let document = fixture
                .engine
                .documents
                .find_by_uuid(receipt.document_uuid)
                .await?
                .unwrap();
            assert_eq!(document.state(), DocumentState::Failed);
            assert_eq!(document.error_message(), Some("unsupported layout"));

            let executions = fixture.engine.executions.list_for_job(job.id()).await?;
            assert!(executions.iter().all(|e| e.step_id() != "never"));
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();

    assert!(fixture.events.names().contains(&"document_failed"));
}

/// Structurally valid but schema-invalid output fails the job with no
/// retries, and the error names the schema path.
#[tokio::test]
async fn schema_invalid_output_fails_the_job_without_retries() {
    let fixture = test_engine("acme").await;
    fixture
        .engine
        .registry
        .register(ScriptedProcessor::with_output_schema(
            "strict",
            vec![ProcessorOutcome::success(json!({"confidence": 7.5}))],
            json!({
                "type": "object",
                "required": ["text"],
                "properties": {
                    "text": { "type": "string" },
                    "confidence": { "type": "number", "maximum": 1 }
                }
            }),
        ));

    let slug = import_campaign(
        &fixture,
        json!({
            "name": "Strict Pipeline",
            "type": "custom",
            "state": "active",
            "processors": [
                { "id": "strict", "type": "strict", "config": {} }
            ]
        }),
    )
    .await;
    let receipt = upload_tiny_pdf(&fixture, &slug).await;

    drive_to_idle(&fixture).await;

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let job = fixture
                .engine
                .jobs
                .find_by_uuid(receipt.job_uuid)
                .await?
                .unwrap();
            assert_eq!(job.state(), JobState::Failed);
            assert_eq!(job.error_log().len(), 1);
            let message = &job.error_log()[0].message;
            assert!(
                message.contains("text") || message.contains("confidence"),
                "error should name the failing schema path, got: {message}"
            );

            // No retries: exactly one execution, failed.
            let executions = fixture.engine.executions.list_for_job(job.id()).await?;
            assert_eq!(executions.len(), 1);
            assert_eq!(executions[0].state(), ExecutionState::Failed);
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();
}

/// Re-delivering an already-processed unit produces no
/// duplicate executions and never moves the cursor backwards.
#[tokio::test]
async fn duplicate_units_are_no_ops() {
    let fixture = test_engine("acme").await;
    let slug = import_campaign(&fixture, standard_definition("Invoices")).await;
    let receipt = upload_tiny_pdf(&fixture, &slug).await;

    drive_to_idle(&fixture).await;

    // Re-run step 0 attempt 1 directly against the orchestrator.
    let job_id = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            Ok::<_, EngineError>(
                fixture
                    .engine
                    .jobs
                    .find_by_uuid(receipt.job_uuid)
                    .await?
                    .unwrap()
                    .id(),
            )
        })
        .await
        .unwrap();

    let advance = fixture
        .engine
        .orchestrator
        .run_step(fixture.tenant.clone(), job_id, 0, 1)
        .await
        .unwrap();
    assert_eq!(
        advance,
        docuflow::application::services::orchestrator::StepAdvance::NoOp
    );

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let executions = fixture.engine.executions.list_for_job(job_id).await?;
            assert_eq!(executions.len(), 3);
            let job = fixture.engine.jobs.find_by_id(job_id).await?.unwrap();
            assert_eq!(job.current_step_index(), 3);
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();
}

/// Cancellation: a cancelled job's queued unit is abandoned without
/// executing anything.
#[tokio::test]
async fn cancelled_jobs_surrender_before_executing() {
    let fixture = test_engine("acme").await;
    let slug = import_campaign(&fixture, standard_definition("Invoices")).await;
    let receipt = upload_tiny_pdf(&fixture, &slug).await;

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let job = fixture
                .engine
                .jobs
                .find_by_uuid(receipt.job_uuid)
                .await?
                .unwrap();
            assert!(
                fixture
                    .engine
                    .jobs
                    .transition_state(job.id(), JobState::Queued, JobState::Cancelled)
                    .await?
            );
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();

    drive_to_idle(&fixture).await;

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let job = fixture
                .engine
                .jobs
                .find_by_uuid(receipt.job_uuid)
                .await?
                .unwrap();
            assert_eq!(job.state(), JobState::Cancelled);
            let executions = fixture.engine.executions.list_for_job(job.id()).await?;
            assert!(executions.is_empty());
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();
}
