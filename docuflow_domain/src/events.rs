// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Events
//!
//! Event values emitted at pipeline milestones. Broadcast transport is an
//! external collaborator; the engine only produces the values and hands
//! them to whatever [`EventPublisher`] is wired in.

use serde::{Deserialize, Serialize};

use crate::value_objects::{DocumentId, JobId, TenantId};

/// A milestone in a document's processing lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    DocumentCompleted {
        tenant_id: TenantId,
        document_id: DocumentId,
        job_id: JobId,
    },
    DocumentFailed {
        tenant_id: TenantId,
        document_id: DocumentId,
        job_id: JobId,
        message: String,
    },
    StepCompleted {
        tenant_id: TenantId,
        job_id: JobId,
        step_id: String,
        step_index: i64,
        stage_count: i64,
    },
}

impl EngineEvent {
    /// Stable event name for transports and log lines.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::DocumentCompleted { .. } => "document_completed",
            EngineEvent::DocumentFailed { .. } => "document_failed",
            EngineEvent::StepCompleted { .. } => "step_completed",
        }
    }
}

/// Outbound event port. Implementations must be cheap and non-blocking;
/// delivery guarantees belong to the transport, not the engine.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &EngineEvent);
}

/// Publisher that drops every event. Useful for tests and tools that do not
/// care about broadcasts.
pub struct NullEventPublisher;

impl EventPublisher for NullEventPublisher {
    fn publish(&self, _event: &EngineEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_a_tag() {
        let event = EngineEvent::DocumentCompleted {
            tenant_id: TenantId::new(),
            document_id: DocumentId::new(),
            job_id: JobId::new(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "document_completed");
        assert_eq!(event.name(), "document_completed");
    }
}
