// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Exit Code Management
//!
//! Standardized Unix exit codes following BSD `sysexits.h` conventions.
//! The importer's machine-readable error surface maps onto these: `0`
//! success, `65` malformed/invalid definitions, `66` unreadable input,
//! `67` missing tenant, `78` configuration problems.
//!
//! ## Exit Code Conventions
//!
//! - **0**: Success
//! - **1**: General error
//! - **64-78**: Specific error conditions (BSD sysexits.h)
//! - **128+N**: Fatal signal N (e.g., 130 = SIGINT)

use std::fmt;

/// Exit codes following Unix conventions (BSD sysexits.h)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful termination (0)
    #[default]
    Success = 0,

    /// General error (1)
    Error = 1,

    /// Command line usage error (64)
    /// - Invalid arguments
    /// - Missing required arguments
    UsageError = 64,

    /// Data format error (65)
    /// - Parse errors
    /// - Validation errors (duplicate step ids, bad enums)
    DataError = 65,

    /// Cannot open input (66)
    /// - Definition file not found or unreadable
    NoInput = 66,

    /// User does not exist (67)
    /// - Unknown tenant or user referenced
    NoUser = 67,

    /// Service unavailable (69)
    /// - Database or queue unreachable
    Unavailable = 69,

    /// Internal software error (70)
    Software = 70,

    /// Cannot create output (73)
    CantCreate = 73,

    /// I/O error (74)
    IoError = 74,

    /// Temporary failure, retry may succeed (75)
    TempFail = 75,

    /// Permission denied (77)
    NoPerm = 77,

    /// Configuration error (78)
    /// - Unknown processor types
    /// - Missing credential key
    Config = 78,

    /// Interrupted by SIGINT (130)
    Interrupted = 130,

    /// Terminated by SIGTERM (143)
    Terminated = 143,
}

impl ExitCode {
    /// The process exit status value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Human-readable description for diagnostics.
    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::Error => "General error",
            ExitCode::UsageError => "Command line usage error",
            ExitCode::DataError => "Data format error",
            ExitCode::NoInput => "Cannot open input",
            ExitCode::NoUser => "Tenant or user does not exist",
            ExitCode::Unavailable => "Service unavailable",
            ExitCode::Software => "Internal software error",
            ExitCode::CantCreate => "Cannot create output",
            ExitCode::IoError => "I/O error",
            ExitCode::TempFail => "Temporary failure, retry",
            ExitCode::NoPerm => "Permission denied",
            ExitCode::Config => "Configuration error",
            ExitCode::Interrupted => "Interrupted by signal (SIGINT)",
            ExitCode::Terminated => "Terminated by signal (SIGTERM)",
        }
    }

    /// Maps a fatal signal number to its conventional exit code.
    pub fn from_signal(signal: i32) -> Self {
        match signal {
            2 => ExitCode::Interrupted,
            15 => ExitCode::Terminated,
            _ => ExitCode::Error,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_i32(), self.description())
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.as_i32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_follow_sysexits() {
        assert_eq!(ExitCode::Success.as_i32(), 0);
        assert_eq!(ExitCode::DataError.as_i32(), 65);
        assert_eq!(ExitCode::NoInput.as_i32(), 66);
        assert_eq!(ExitCode::NoUser.as_i32(), 67);
        assert_eq!(ExitCode::Config.as_i32(), 78);
        assert_eq!(ExitCode::Interrupted.as_i32(), 130);
    }

    #[test]
    fn signals_map_to_128_plus_n() {
        assert_eq!(ExitCode::from_signal(2), ExitCode::Interrupted);
        assert_eq!(ExitCode::from_signal(15), ExitCode::Terminated);
        assert_eq!(ExitCode::from_signal(9), ExitCode::Error);
    }
}
