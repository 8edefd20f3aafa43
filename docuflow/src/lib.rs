// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Docuflow
//!
//! Core document processing engine of a multi-tenant platform: documents
//! are ingested, routed through user-defined pipelines of heterogeneous
//! processors (OCR, classification, extraction, validation, enrichment,
//! notification), and every result is recorded with full auditability.
//!
//! ## Architecture Overview
//!
//! The engine follows Clean Architecture and Domain-Driven Design
//! principles across three crates:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Presentation (CLI)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Application Layer                           │
//! │  (Orchestrator, Dispatcher/Worker, Upload, Importer,        │
//! │   Provisioning, Read Models, Engine composition root)       │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Domain Layer (docuflow-domain)              │
//! │  (Entities, State Machines, Processor Contract, Ports)      │
//! └─────────────────────────────────────────────────────────────┘
//!                                ▲
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Infrastructure Layer                        │
//! │  (Tenancy, SQLite repositories, Registry, Processors,       │
//! │   Queue, Storage, Crypto, Validation, Metrics, Logging)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! ### Tenant Isolation
//! Every tenant owns a physical database `tenant_<id>`. A task-local
//! tenant context tracks the current binding; tenant-scoped repositories
//! resolve their handle through it and refuse to run without one. Work
//! units crossing the queue carry `tenant_id` explicitly and rebind on
//! arrival - tenant identity is never ambient across processes.
//!
//! ### Pipelines
//! A campaign freezes its processor list into each job's pipeline
//! snapshot. The orchestrator advances a job one step per queue unit,
//! with per-step retries, declared timeouts, output-schema validation,
//! usage metering, and an append-only audit trail around every state
//! transition.
//!
//! ### Processors
//! Heterogeneous processing units satisfy one contract (`id` /
//! `describe` / `execute`) and are resolved through a copy-on-write
//! registry seeded by discovery at boot, with a lazy fallback to the
//! tenant's `processors` table.

pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use docuflow_domain::{
    Campaign, Document, DocumentJob, DocumentState, EngineError, EngineEvent, ExecutionState,
    JobState, PipelineConfig, PipelineStep, ProcessorExecution, Tenant,
};

pub use crate::application::engine::Engine;
