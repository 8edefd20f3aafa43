// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain services and ports: the processor contract, hierarchical
//! credential resolution, execution hooks, and the content store port.

pub mod content_store;
pub mod credential_resolver;
pub mod hooks;
pub mod processor;

pub use content_store::ContentStore;
pub use credential_resolver::{
    CredentialCipher, CredentialLookup, CredentialResolver, HierarchicalCredentialResolver,
};
pub use hooks::{ExecutionHook, TimeTrackingHook};
pub use processor::{
    FailureKind, Processor, ProcessorContext, ProcessorDescriptor, ProcessorOutcome,
    DEFAULT_TIMEOUT,
};
