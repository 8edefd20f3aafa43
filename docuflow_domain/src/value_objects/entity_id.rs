// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Generic Entity Identifier
//!
//! ULID-backed, type-safe identifiers shared by every entity in the engine.
//! The marker parameter makes `EntityId<TenantMarker>` and
//! `EntityId<DocumentMarker>` distinct types, so a tenant id can never be
//! passed where a document id is expected, while all id behavior lives in a
//! single implementation.
//!
//! ULIDs are used for internal identity because they are lexicographically
//! sortable by creation time, which keeps SQLite primary-key pages dense.
//! Public handles exposed outside the engine use UUIDv4 instead (see the
//! `uuid` fields on `Document` and `DocumentJob`).
//!
//! ## Examples
//!
//! ```
//! use docuflow_domain::value_objects::{DocumentId, TenantId};
//! use std::str::FromStr;
//!
//! let id = DocumentId::new();
//! let parsed = DocumentId::from_str(&id.to_string()).unwrap();
//! assert_eq!(id, parsed);
//!
//! // Distinct marker types do not compare or assign across entities:
//! let _tenant: TenantId = TenantId::new();
//! ```

use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::EngineError;

/// Type-safe ULID identifier parameterized by an entity marker.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId<M> {
    value: Ulid,
    #[serde(skip)]
    _marker: PhantomData<M>,
}

impl<M> EntityId<M> {
    /// Generates a new random identifier
    pub fn new() -> Self {
        Self {
            value: Ulid::new(),
            _marker: PhantomData,
        }
    }

    /// Wraps an existing ULID
    pub fn from_ulid(value: Ulid) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    /// Gets the underlying ULID
    pub fn as_ulid(&self) -> Ulid {
        self.value
    }
}

impl<M> Default for EntityId<M> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: derive would bound the marker type, which is never
// instantiated and carries no data.
impl<M> Clone for EntityId<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for EntityId<M> {}

impl<M> PartialEq for EntityId<M> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<M> Eq for EntityId<M> {}

impl<M> PartialOrd for EntityId<M> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for EntityId<M> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

impl<M> Hash for EntityId<M> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<M> fmt::Debug for EntityId<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.value)
    }
}

impl<M> Display for EntityId<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.value, f)
    }
}

impl<M> std::str::FromStr for EntityId<M> {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Ulid::from_string(s)
            .map_err(|e| EngineError::invalid_config(format!("Invalid identifier '{}': {}", s, e)))?;
        Ok(Self::from_ulid(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    struct TestMarker;

    #[test]
    fn round_trips_through_string_form() {
        let id: EntityId<TestMarker> = EntityId::new();
        let parsed = EntityId::<TestMarker>::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(EntityId::<TestMarker>::from_str("not-a-ulid").is_err());
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a: EntityId<TestMarker> = EntityId::new();
        let b: EntityId<TestMarker> = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn serializes_as_bare_string() {
        let id: EntityId<TestMarker> = EntityId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }

    proptest::proptest! {
        #[test]
        fn any_ulid_round_trips_through_string_form(raw in proptest::prelude::any::<u128>()) {
            let id: EntityId<TestMarker> = EntityId::from_ulid(Ulid::from(raw));
            let text = id.to_string();
            proptest::prop_assert_eq!(text.len(), 26);
            let parsed = EntityId::<TestMarker>::from_str(&text).unwrap();
            proptest::prop_assert_eq!(id, parsed);
        }

        #[test]
        fn ordering_matches_the_underlying_ulid(a in proptest::prelude::any::<u128>(),
                                                b in proptest::prelude::any::<u128>()) {
            let left: EntityId<TestMarker> = EntityId::from_ulid(Ulid::from(a));
            let right: EntityId<TestMarker> = EntityId::from_ulid(Ulid::from(b));
            proptest::prop_assert_eq!(left.cmp(&right), a.cmp(&b));
        }
    }
}
