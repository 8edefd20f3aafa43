// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Tenant isolation scenarios: cross-tenant invisibility, refusal without
//! a binding, suspended-tenant unit dropping, and audit immutability.

mod common;

use common::*;
use serde_json::json;

use docuflow_domain::repositories::{AuditLedger, CampaignRepository, JobRepository};
use docuflow_domain::{EngineError, TenantStatus};

/// Identically-named campaigns in two tenants never see each other.
#[tokio::test]
async fn campaigns_are_invisible_across_tenants() {
    let fixture = test_engine("alpha").await;
    let beta = fixture
        .engine
        .provisioner()
        .provision("beta", "ops@beta.test", None)
        .await
        .unwrap();

    let definition = json!({
        "name": "Shared Name",
        "type": "custom",
        "state": "active",
        "processors": [{ "id": "ocr", "type": "ocr", "config": {} }]
    });

    // Same definition imported under both tenants.
    import_campaign(&fixture, definition.clone()).await;
    let importer = fixture.engine.importer();
    let source = docuflow::application::use_cases::import_campaign::DefinitionSource {
        inline: Some(definition.to_string()),
        ..Default::default()
    };
    fixture
        .engine
        .connections
        .with_tenant(beta.clone(), importer.import(&source, false))
        .await
        .unwrap();

    let alpha_rows = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), fixture.engine.campaigns.list())
        .await
        .unwrap();
    let beta_rows = fixture
        .engine
        .connections
        .with_tenant(beta, fixture.engine.campaigns.list())
        .await
        .unwrap();

    assert_eq!(alpha_rows.len(), 1);
    assert_eq!(beta_rows.len(), 1);
    assert_ne!(alpha_rows[0].id(), beta_rows[0].id());
}

/// Tenant-scoped repositories refuse to operate without a binding.
#[tokio::test]
async fn repositories_fail_loudly_without_a_binding() {
    let fixture = test_engine("alpha").await;
    let err = fixture.engine.campaigns.list().await.unwrap_err();
    assert!(matches!(err, EngineError::MissingTenantContext(_)));
}

/// Work units for suspended tenants are dropped, not processed.
#[tokio::test]
async fn suspended_tenant_units_are_dropped() {
    let fixture = test_engine("alpha").await;
    let slug = import_campaign(&fixture, standard_definition("Invoices")).await;
    let receipt = upload_tiny_pdf(&fixture, &slug).await;

    // Suspend after the unit is queued.
    let mut tenant = fixture.tenant.clone();
    tenant.suspend();
    fixture.engine.catalog.save(&tenant).await.unwrap();

    drive_to_idle(&fixture).await;

    fixture
        .engine
        .connections
        .with_tenant(tenant.clone(), async {
            // Nothing executed.
            let job = fixture
                .engine
                .jobs
                .find_by_uuid(receipt.job_uuid)
                .await?
                .unwrap();
            assert_eq!(job.current_step_index(), 0);

            // The drop left an audit trace.
            let entries = fixture
                .engine
                .audit
                .list_for("document_job", &job.id().to_string())
                .await?;
            assert!(entries.iter().any(|e| e.event == "unit_dropped"));
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();

    assert_eq!(tenant.status(), TenantStatus::Suspended);
}

/// The audit ledger rejects updates and deletes at the
/// database level.
#[tokio::test]
async fn audit_rows_are_immutable() {
    let fixture = test_engine("alpha").await;
    let slug = import_campaign(&fixture, standard_definition("Invoices")).await;
    upload_tiny_pdf(&fixture, &slug).await;
    drive_to_idle(&fixture).await;

    let pool = fixture
        .engine
        .connections
        .acquire(&fixture.tenant)
        .await
        .unwrap();
    let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(before > 0);

    assert!(sqlx::query("UPDATE audit_logs SET event = 'tampered'")
        .execute(&pool)
        .await
        .is_err());
    assert!(sqlx::query("DELETE FROM audit_logs")
        .execute(&pool)
        .await
        .is_err());

    let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(before, after);
}

/// Nested bindings restore the outer tenant (context unit behavior
/// exercised through the public engine surface).
#[tokio::test]
async fn nested_bindings_restore_outer_tenant() {
    let fixture = test_engine("alpha").await;
    let beta = fixture
        .engine
        .provisioner()
        .provision("beta", "ops@beta.test", None)
        .await
        .unwrap();

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            let inner = fixture
                .engine
                .connections
                .with_tenant(beta.clone(), async {
                    Ok::<_, EngineError>(
                        docuflow::infrastructure::tenancy::context::TenantContext::require("test")?
                            .slug()
                            .to_string(),
                    )
                })
                .await?;
            assert_eq!(inner, "beta");
            let outer =
                docuflow::infrastructure::tenancy::context::TenantContext::require("test")?;
            assert_eq!(outer.slug(), "alpha");
            Ok::<(), EngineError>(())
        })
        .await
        .unwrap();
}
