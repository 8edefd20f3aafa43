// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Hierarchical credential resolution against the real store and cipher:
//! narrowest scope wins, removing a scope exposes the broader one, expiry
//! means absence, and resolutions touch `last_used_at`.

mod common;

use common::*;
use chrono::Duration;

use docuflow_domain::repositories::CredentialRepository;
use docuflow_domain::services::{CredentialLookup, CredentialResolver};
use docuflow_domain::{CampaignId, Credential, CredentialCipher, CredentialScope};

struct Scopes {
    campaign_id: CampaignId,
}

async fn seed(fixture: &TestEngine) -> Scopes {
    let cipher = fixture.engine.credential_cipher.clone().unwrap();
    let campaign_id = CampaignId::new();
    let tenant_id = fixture.tenant.id();

    let entries = [
        (CredentialScope::System, None, "system-secret"),
        (
            CredentialScope::Tenant,
            Some(tenant_id.to_string()),
            "tenant-secret",
        ),
        (
            CredentialScope::Campaign,
            Some(campaign_id.to_string()),
            "campaign-secret",
        ),
        (
            CredentialScope::Processor,
            Some("ocr".to_string()),
            "processor-secret",
        ),
    ];
    for (scope, scope_ref, plaintext) in entries {
        let credential = Credential::new(
            "api_key".into(),
            cipher.encrypt(plaintext).unwrap(),
            scope,
            scope_ref,
        )
        .unwrap();
        fixture
            .engine
            .connections
            .with_tenant(fixture.tenant.clone(), async {
                fixture.engine.credential_repository.insert(&credential).await
            })
            .await
            .unwrap();
    }
    Scopes { campaign_id }
}

fn full_lookup(fixture: &TestEngine, scopes: &Scopes) -> CredentialLookup {
    CredentialLookup::new()
        .for_processor("ocr")
        .for_campaign(scopes.campaign_id)
        .for_tenant(fixture.tenant.id())
}

async fn resolve(fixture: &TestEngine, lookup: &CredentialLookup) -> Option<String> {
    let credentials = fixture.engine.credentials.clone();
    let lookup = lookup.clone();
    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async move {
            credentials.resolve("api_key", &lookup).await
        })
        .await
        .unwrap()
}

/// The narrowest non-expired scope wins, and dropping it
/// exposes the next one out, transparently.
#[tokio::test]
async fn narrowest_scope_wins_and_removal_exposes_broader() {
    let fixture = test_engine("acme").await;
    let scopes = seed(&fixture).await;
    let lookup = full_lookup(&fixture, &scopes);

    assert_eq!(
        resolve(&fixture, &lookup).await.as_deref(),
        Some("processor-secret")
    );

    // Soft-delete the processor-scope value: campaign scope shows through.
    let processor_credential = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            fixture
                .engine
                .credential_repository
                .find("api_key", CredentialScope::Processor, Some("ocr"))
                .await
        })
        .await
        .unwrap()
        .unwrap();
    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            fixture
                .engine
                .credential_repository
                .soft_delete(processor_credential.id)
                .await
        })
        .await
        .unwrap();
    // Writes invalidate the read-through cache.
    fixture
        .engine
        .credential_cache
        .as_ref()
        .unwrap()
        .invalidate("api_key");

    assert_eq!(
        resolve(&fixture, &lookup).await.as_deref(),
        Some("campaign-secret")
    );

    // Narrower refs absent from the lookup skip straight to tenant scope.
    let tenant_only = CredentialLookup::new().for_tenant(fixture.tenant.id());
    assert_eq!(
        resolve(&fixture, &tenant_only).await.as_deref(),
        Some("tenant-secret")
    );

    // No refs at all falls through to system scope.
    let bare = CredentialLookup::new();
    assert_eq!(resolve(&fixture, &bare).await.as_deref(), Some("system-secret"));
}

/// Expired credentials are treated as absent.
#[tokio::test]
async fn expired_credentials_resolve_as_absent() {
    let fixture = test_engine("acme").await;
    let cipher = fixture.engine.credential_cipher.clone().unwrap();

    let expired = Credential::new(
        "rotating_key".into(),
        cipher.encrypt("old").unwrap(),
        CredentialScope::Processor,
        Some("ocr".into()),
    )
    .unwrap()
    .with_expiry(chrono::Utc::now() - Duration::hours(1));
    let live = Credential::new(
        "rotating_key".into(),
        cipher.encrypt("current").unwrap(),
        CredentialScope::System,
        None,
    )
    .unwrap();

    fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            fixture.engine.credential_repository.insert(&expired).await?;
            fixture.engine.credential_repository.insert(&live).await
        })
        .await
        .unwrap();

    let lookup = CredentialLookup::new().for_processor("ocr");
    let credentials = fixture.engine.credentials.clone();
    let resolved = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async move {
            credentials.resolve("rotating_key", &lookup).await
        })
        .await
        .unwrap();
    assert_eq!(resolved.as_deref(), Some("current"));
}

/// Successful resolutions stamp `last_used_at`.
#[tokio::test]
async fn resolution_touches_last_used_at() {
    let fixture = test_engine("acme").await;
    let scopes = seed(&fixture).await;
    let lookup = full_lookup(&fixture, &scopes);

    resolve(&fixture, &lookup).await.unwrap();

    let touched = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            fixture
                .engine
                .credential_repository
                .find("api_key", CredentialScope::Processor, Some("ocr"))
                .await
        })
        .await
        .unwrap()
        .unwrap();
    assert!(touched.last_used_at.is_some());

    // Broader scopes were never resolved and stay untouched.
    let untouched = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            fixture
                .engine
                .credential_repository
                .find("api_key", CredentialScope::System, None)
                .await
        })
        .await
        .unwrap()
        .unwrap();
    assert!(untouched.last_used_at.is_none());
}

/// Values on disk are ciphertext, never the plaintext.
#[tokio::test]
async fn stored_values_are_opaque_ciphertext() {
    let fixture = test_engine("acme").await;
    let scopes = seed(&fixture).await;
    let _ = scopes;

    let stored = fixture
        .engine
        .connections
        .with_tenant(fixture.tenant.clone(), async {
            fixture
                .engine
                .credential_repository
                .find("api_key", CredentialScope::System, None)
                .await
        })
        .await
        .unwrap()
        .unwrap();
    assert_ne!(stored.encrypted_value, "system-secret");
    assert!(!stored.encrypted_value.contains("secret"));
}
