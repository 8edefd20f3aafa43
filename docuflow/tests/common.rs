// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures for the integration suites: a scratch engine over a
//! temp directory, a provisioned tenant with an owning user, scripted
//! processors, and a queue-driving helper that collapses retry backoff so
//! multi-attempt scenarios run instantly.

// Each suite pulls in the subset of fixtures it needs.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use docuflow::application::engine::Engine;
use docuflow::application::services::dispatcher::Worker;
use docuflow::infrastructure::config::EngineConfig;
use docuflow::infrastructure::crypto::credential_cipher::AesGcmCredentialCipher;
use docuflow::infrastructure::events::CollectingEventPublisher;
use docuflow_domain::services::{
    Processor, ProcessorContext, ProcessorDescriptor, ProcessorOutcome,
};
use docuflow_domain::{EngineError, EventPublisher, ProcessorCategory, Tenant, UserId};

/// A scratch engine plus the handles the suites poke at.
pub struct TestEngine {
    pub engine: Engine,
    pub events: Arc<CollectingEventPublisher>,
    pub tenant: Tenant,
    pub user_id: UserId,
    _dir: tempfile::TempDir,
}

/// Builds an engine in a temp directory and provisions one tenant with an
/// owning user.
pub async fn test_engine(tenant_slug: &str) -> TestEngine {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig {
        data_dir: dir.path().join("data").display().to_string(),
        storage_root: dir.path().join("storage").display().to_string(),
        credential_key: Some(AesGcmCredentialCipher::generate_key()),
        ..EngineConfig::default()
    };
    let events = Arc::new(CollectingEventPublisher::new());
    let engine = Engine::build_with_events(config, events.clone() as Arc<dyn EventPublisher>)
        .await
        .unwrap();

    let owner_email = format!("owner@{tenant_slug}.test");
    let tenant = engine
        .provisioner()
        .provision(tenant_slug, &format!("ops@{tenant_slug}.test"), Some(&owner_email))
        .await
        .unwrap();
    let user_id = lookup_user(&engine, &owner_email).await;

    TestEngine {
        engine,
        events,
        tenant,
        user_id,
        _dir: dir,
    }
}

async fn lookup_user(engine: &Engine, email: &str) -> UserId {
    use std::str::FromStr;
    let id: String = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_one(engine.connections.central())
        .await
        .unwrap();
    UserId::from_str(&id).unwrap()
}

/// Drains the queue to quiescence, collapsing retry backoff between
/// claims so exponential delays don't stall the test clock.
pub async fn drive_to_idle(fixture: &TestEngine) {
    let worker = worker(fixture);
    loop {
        make_all_due(fixture).await;
        let Some(unit) = fixture.engine.queue.claim().await.unwrap() else {
            break;
        };
        worker.process_unit(&unit).await.unwrap();
    }
}

pub fn worker(fixture: &TestEngine) -> Worker {
    fixture.engine.worker()
}

/// Makes every queued unit immediately claimable.
pub async fn make_all_due(fixture: &TestEngine) {
    sqlx::query("UPDATE work_queue SET available_at = '2000-01-01T00:00:00+00:00' WHERE state = 'queued'")
        .execute(fixture.engine.connections.central())
        .await
        .unwrap();
}

/// Imports a campaign definition (inline JSON) for the fixture tenant.
pub async fn import_campaign(fixture: &TestEngine, definition: Value) -> String {
    let importer = fixture.engine.importer();
    let source = docuflow::application::use_cases::import_campaign::DefinitionSource {
        inline: Some(definition.to_string()),
        ..Default::default()
    };
    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), importer.import(&source, false))
        .await
        .unwrap()
        .slug
}

/// A deterministic three-stage campaign over the built-in processors.
pub fn standard_definition(name: &str) -> Value {
    json!({
        "name": name,
        "type": "custom",
        "state": "active",
        "allowed_mime_types": ["application/pdf", "text/plain", "text/csv"],
        "processors": [
            { "id": "ocr", "type": "ocr", "config": { "lang": "eng" } },
            { "id": "cls", "type": "classification", "config": { "categories": ["invoice", "receipt"] } },
            { "id": "ext", "type": "extraction", "config": { "schema": { "invoice": ["total"] } } }
        ]
    })
}

/// Processor whose outcomes are scripted per invocation; once the script
/// is exhausted it succeeds with an empty output.
pub struct ScriptedProcessor {
    slug: &'static str,
    outcomes: Mutex<VecDeque<ProcessorOutcome>>,
    output_schema: Option<Value>,
}

impl ScriptedProcessor {
    pub fn new(slug: &'static str, outcomes: Vec<ProcessorOutcome>) -> Arc<Self> {
        Arc::new(Self {
            slug,
            outcomes: Mutex::new(outcomes.into()),
            output_schema: None,
        })
    }

    pub fn with_output_schema(
        slug: &'static str,
        outcomes: Vec<ProcessorOutcome>,
        schema: Value,
    ) -> Arc<Self> {
        Arc::new(Self {
            slug,
            outcomes: Mutex::new(outcomes.into()),
            output_schema: Some(schema),
        })
    }
}

#[async_trait]
impl Processor for ScriptedProcessor {
    fn id(&self) -> &str {
        self.slug
    }

    fn describe(&self) -> ProcessorDescriptor {
        let mut descriptor =
            ProcessorDescriptor::new("Scripted", ProcessorCategory::Other("test".into()), json!({}));
        if let Some(schema) = &self.output_schema {
            descriptor = descriptor.with_output_schema(schema.clone());
        }
        descriptor
    }

    async fn execute(&self, _ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
        let next = self.outcomes.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| ProcessorOutcome::success(json!({}))))
    }
}

/// Uploads a 17-byte PDF into the given campaign and returns the public
/// handles.
pub async fn upload_tiny_pdf(
    fixture: &TestEngine,
    campaign_slug: &str,
) -> docuflow::application::services::upload::UploadReceipt {
    let bytes = b"%PDF tiny invoice";
    assert_eq!(bytes.len(), 17);
    fixture
        .engine
        .upload_service()
        .upload(
            fixture.user_id,
            campaign_slug,
            "invoice.pdf",
            "application/pdf",
            bytes,
        )
        .await
        .unwrap()
}
