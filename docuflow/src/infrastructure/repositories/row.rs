// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Row mapping helpers shared by the SQLite repositories.
//!
//! Timestamps are stored as RFC 3339 TEXT and structured fields as JSON
//! TEXT; these helpers centralize the decode so every repository reports
//! the same error shapes.

use std::str::FromStr;

use docuflow_domain::EngineError;

/// Parses a required RFC 3339 timestamp column.
pub fn parse_ts(value: &str) -> Result<chrono::DateTime<chrono::Utc>, EngineError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| EngineError::SerializationError(format!("Bad timestamp '{}': {}", value, e)))
}

/// Parses an optional RFC 3339 timestamp column.
pub fn parse_opt_ts(
    value: Option<String>,
) -> Result<Option<chrono::DateTime<chrono::Utc>>, EngineError> {
    value.as_deref().map(parse_ts).transpose()
}

/// Formats a timestamp for storage.
pub fn fmt_ts(value: &chrono::DateTime<chrono::Utc>) -> String {
    value.to_rfc3339()
}

/// Formats an optional timestamp for storage.
pub fn fmt_opt_ts(value: Option<&chrono::DateTime<chrono::Utc>>) -> Option<String> {
    value.map(fmt_ts)
}

/// Decodes a JSON TEXT column into a typed value.
pub fn parse_json<T: serde::de::DeserializeOwned>(value: &str) -> Result<T, EngineError> {
    serde_json::from_str(value)
        .map_err(|e| EngineError::SerializationError(format!("Bad JSON column: {}", e)))
}

/// Encodes a value into a JSON TEXT column.
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string(value)
        .map_err(|e| EngineError::SerializationError(format!("Cannot encode JSON column: {}", e)))
}

/// Parses a TEXT id column into a typed entity id.
pub fn parse_id<M>(value: &str) -> Result<docuflow_domain::value_objects::EntityId<M>, EngineError> {
    docuflow_domain::value_objects::EntityId::from_str(value)
}

/// Parses a TEXT uuid column.
pub fn parse_uuid(value: &str) -> Result<uuid::Uuid, EngineError> {
    uuid::Uuid::parse_str(value)
        .map_err(|e| EngineError::SerializationError(format!("Bad UUID '{}': {}", value, e)))
}

/// Maps a sqlx error into the engine's database error kind.
pub fn db_err(context: &str, err: sqlx::Error) -> EngineError {
    EngineError::database_error(format!("{}: {}", context, err))
}
