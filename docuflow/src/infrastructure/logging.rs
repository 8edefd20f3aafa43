// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Logging
//!
//! Structured logging via `tracing`. The env filter honors `RUST_LOG` and
//! falls back to the configured level; the format is either human-readable
//! (development) or single-line JSON-ish compact output (production).
//!
//! Tenant identity and job ids travel as span/event fields, never embedded
//! in message strings, so log pipelines can index them.

use tracing_subscriber::{fmt, EnvFilter};

use docuflow_domain::EngineError;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown log format: {}",
                s
            ))),
        }
    }
}

/// Initializes the global subscriber. Safe to call once per process;
/// subsequent calls are ignored so tests can initialize freely.
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let result = match format {
        LogFormat::Pretty => fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Compact => fmt()
            .with_env_filter(filter)
            .compact()
            .with_target(false)
            .try_init(),
    };
    // A second init (tests, embedded use) is not an error worth surfacing.
    drop(result);
}
