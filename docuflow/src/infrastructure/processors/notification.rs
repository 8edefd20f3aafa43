// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Notification processor: emits a processing milestone to the configured
//! channel. The local baseline supports the `log` channel; a webhook token
//! is resolved through the credential hierarchy when present so rotations
//! apply without config changes.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use docuflow_domain::services::{
    CredentialLookup, CredentialResolver, Processor, ProcessorContext, ProcessorDescriptor,
    ProcessorOutcome,
};
use docuflow_domain::{EngineError, FailureKind, ProcessorCategory};

pub struct NotificationProcessor;

#[async_trait]
impl Processor for NotificationProcessor {
    fn id(&self) -> &str {
        "notification"
    }

    fn describe(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new(
            "Notification",
            ProcessorCategory::Notification,
            json!({
                "type": "object",
                "properties": {
                    "channel": { "type": "string", "enum": ["log"] },
                    "message": { "type": "string" }
                }
            }),
        )
        .with_optional_credential("webhook_token")
    }

    async fn execute(&self, ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
        let channel = ctx.config_str("channel").unwrap_or("log");
        if channel != "log" {
            return Ok(ProcessorOutcome::failure(
                FailureKind::InvalidInput,
                format!("unsupported notification channel '{}'", channel),
                false,
            ));
        }

        let lookup = CredentialLookup::new()
            .for_processor(self.id())
            .for_campaign(ctx.campaign.id());
        let token_present = ctx
            .credentials
            .resolve("webhook_token", &lookup)
            .await?
            .is_some();

        let message = ctx
            .config_str("message")
            .unwrap_or("document processed")
            .to_string();
        info!(
            document = %ctx.document.uuid(),
            campaign = %ctx.campaign.slug(),
            authenticated = token_present,
            "{}",
            message
        );

        Ok(ProcessorOutcome::Success {
            output: json!({
                "notified": true,
                "channel": channel,
                "authenticated": token_present,
            }),
            tokens_used: 0,
            cost_credits: 0.0,
            metadata_delta: json!({ "notified": true }),
        })
    }
}
