// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! Typed configuration layered from defaults, an optional TOML file, and
//! `DOCUFLOW_`-prefixed environment variables (e.g.
//! `DOCUFLOW_WORKER__CONCURRENCY=4`). The credential key is required for
//! any deployment that stores credentials; `docuflow credential keygen`
//! prints a fresh one.

use serde::{Deserialize, Serialize};

use docuflow_domain::EngineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding `central.db` and the `tenant_<id>.db` files.
    pub data_dir: String,
    /// Root of the document content store.
    pub storage_root: String,
    /// Base64-encoded 32-byte AES key for credential values at rest.
    pub credential_key: Option<String>,
    pub worker: WorkerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Concurrent units a single worker process advances.
    pub concurrency: usize,
    /// Idle poll interval against the durable queue, in milliseconds.
    pub poll_interval_ms: u64,
    /// Queue lease duration, in seconds.
    pub lease_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `compact`.
    pub format: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            storage_root: "./storage".to_string(),
            credential_key: None,
            worker: WorkerConfig {
                concurrency: 4,
                poll_interval_ms: 500,
                lease_secs: 120,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}

impl EngineConfig {
    /// Loads configuration: defaults, then the optional file, then the
    /// environment.
    pub fn load(path: Option<&str>) -> Result<Self, EngineError> {
        let mut builder = config::Config::builder()
            .set_default("data_dir", "./data")
            .and_then(|b| b.set_default("storage_root", "./storage"))
            .and_then(|b| b.set_default("worker.concurrency", 4))
            .and_then(|b| b.set_default("worker.poll_interval_ms", 500))
            .and_then(|b| b.set_default("worker.lease_secs", 120))
            .and_then(|b| b.set_default("logging.level", "info"))
            .and_then(|b| b.set_default("logging.format", "pretty"))
            .map_err(|e| EngineError::invalid_config(format!("config defaults: {}", e)))?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("docuflow").required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("DOCUFLOW").separator("__"),
        );

        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| EngineError::invalid_config(format!("configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.worker.concurrency, 4);
        assert!(config.credential_key.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(
            &path,
            "data_dir = \"/var/lib/docuflow\"\n[worker]\nconcurrency = 9\n",
        )
        .unwrap();
        let config = EngineConfig::load(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.data_dir, "/var/lib/docuflow");
        assert_eq!(config.worker.concurrency, 9);
        // Unset values keep their defaults.
        assert_eq!(config.worker.poll_interval_ms, 500);
    }
}
