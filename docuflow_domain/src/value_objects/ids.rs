// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Typed identifier aliases for every entity in the engine.
//!
//! Marker types are never instantiated; they exist only to make the id
//! types mutually incompatible at compile time.

use super::entity_id::EntityId;

/// Marker for tenant identifiers
pub struct TenantMarker;
/// Marker for user identifiers
pub struct UserMarker;
/// Marker for campaign identifiers
pub struct CampaignMarker;
/// Marker for document identifiers
pub struct DocumentMarker;
/// Marker for document job identifiers
pub struct JobMarker;
/// Marker for processor record identifiers
pub struct ProcessorMarker;
/// Marker for processor execution identifiers
pub struct ExecutionMarker;
/// Marker for credential identifiers
pub struct CredentialMarker;
/// Marker for custom validation rule identifiers
pub struct RuleMarker;
/// Marker for usage event identifiers
pub struct UsageEventMarker;
/// Marker for audit entry identifiers
pub struct AuditEntryMarker;

pub type TenantId = EntityId<TenantMarker>;
pub type UserId = EntityId<UserMarker>;
pub type CampaignId = EntityId<CampaignMarker>;
pub type DocumentId = EntityId<DocumentMarker>;
pub type JobId = EntityId<JobMarker>;
pub type ProcessorId = EntityId<ProcessorMarker>;
pub type ExecutionId = EntityId<ExecutionMarker>;
pub type CredentialId = EntityId<CredentialMarker>;
pub type RuleId = EntityId<RuleMarker>;
pub type UsageEventId = EntityId<UsageEventMarker>;
pub type AuditEntryId = EntityId<AuditEntryMarker>;
