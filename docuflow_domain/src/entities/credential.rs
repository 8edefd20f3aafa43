// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Encrypted credential entity.
//!
//! Values on disk are opaque ciphertext; decryption happens only at use
//! sites through the `CredentialCipher` port. Expired credentials are
//! treated as absent during resolution.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::value_objects::CredentialId;

/// Credential scope, searched narrowest-first during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScope {
    System,
    Tenant,
    Campaign,
    Processor,
}

impl CredentialScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialScope::System => "system",
            CredentialScope::Tenant => "tenant",
            CredentialScope::Campaign => "campaign",
            CredentialScope::Processor => "processor",
        }
    }
}

impl std::fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CredentialScope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(CredentialScope::System),
            "tenant" => Ok(CredentialScope::Tenant),
            "campaign" => Ok(CredentialScope::Campaign),
            "processor" => Ok(CredentialScope::Processor),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown credential scope: {}",
                s
            ))),
        }
    }
}

/// An encrypted key/value credential bound to a scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub key: String,
    pub encrypted_value: String,
    pub scope: CredentialScope,
    pub scope_ref: Option<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Credential {
    pub fn new(
        key: String,
        encrypted_value: String,
        scope: CredentialScope,
        scope_ref: Option<String>,
    ) -> Result<Self, EngineError> {
        if key.is_empty() {
            return Err(EngineError::invalid_config("Credential key cannot be empty"));
        }
        if scope != CredentialScope::System && scope_ref.is_none() {
            return Err(EngineError::invalid_config(format!(
                "Credential scope '{}' requires a scope_ref",
                scope
            )));
        }
        let now = chrono::Utc::now();
        Ok(Credential {
            id: CredentialId::new(),
            key,
            encrypted_value,
            scope,
            scope_ref,
            expires_at: None,
            last_used_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    /// Sets an expiry; expired credentials resolve as absent.
    pub fn with_expiry(mut self, expires_at: chrono::DateTime<chrono::Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_usable(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.deleted_at.is_none() && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn scoped_credentials_require_a_ref() {
        assert!(Credential::new("api_key".into(), "ct".into(), CredentialScope::Processor, None).is_err());
        assert!(Credential::new("api_key".into(), "ct".into(), CredentialScope::System, None).is_ok());
    }

    #[test]
    fn expiry_makes_a_credential_unusable() {
        let now = chrono::Utc::now();
        let cred = Credential::new("k".into(), "ct".into(), CredentialScope::System, None)
            .unwrap()
            .with_expiry(now - Duration::seconds(1));
        assert!(cred.is_expired(now));
        assert!(!cred.is_usable(now));
    }
}
