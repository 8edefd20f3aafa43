// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Event publisher implementations. Broadcast transport is an external
//! collaborator; in-process the engine logs event values and, in tests,
//! collects them.

use std::sync::Mutex;

use tracing::info;

use docuflow_domain::{EngineEvent, EventPublisher};

/// Publishes events as structured log lines. The production default until a
/// real transport is wired in by the hosting application.
pub struct TracingEventPublisher;

impl EventPublisher for TracingEventPublisher {
    fn publish(&self, event: &EngineEvent) {
        let payload = serde_json::to_string(event).unwrap_or_else(|_| event.name().to_string());
        info!(event = event.name(), payload = %payload, "engine event");
    }
}

/// Collects events in memory; test instrumentation.
#[derive(Default)]
pub struct CollectingEventPublisher {
    events: Mutex<Vec<EngineEvent>>,
}

impl CollectingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|mut e| e.drain(..).collect()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .map(|e| e.iter().map(EngineEvent::name).collect())
            .unwrap_or_default()
    }
}

impl EventPublisher for CollectingEventPublisher {
    fn publish(&self, event: &EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
