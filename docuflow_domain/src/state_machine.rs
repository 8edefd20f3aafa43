// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Lifecycle State Machines
//!
//! Formal states and guarded transitions for the three lifecycles the engine
//! tracks: documents, document jobs, and processor executions.
//!
//! Transitions are encoded as a single static allow-list keyed by
//! `(machine, from, to)`. Everything not present in the table is rejected
//! with [`EngineError::StateTransitionRejected`] - a programming error that
//! is surfaced loudly, never swallowed. The persistence layer re-checks the
//! same guard with conditional updates so racing workers cannot commit an
//! illegal transition either.
//!
//! ## Machines
//!
//! ```text
//! Document:          pending -> queued -> processing -> {completed | failed | cancelled}
//! DocumentJob:       pending -> queued -> running    -> {completed | failed | cancelled}
//!                    failed  -> queued   (retry policy, while attempts remain)
//!                    failed  -> failed   (idempotent re-fail on retry exhaustion)
//! ProcessorExecution: pending -> running -> {completed | failed | skipped}
//! ```
//!
//! Cancellation is allowed from any non-terminal state on documents and
//! jobs; in-flight workers observe it at the next persistence boundary.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// The three lifecycles governed by the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Machine {
    Document,
    Job,
    Execution,
}

impl std::fmt::Display for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Machine::Document => write!(f, "document"),
            Machine::Job => write!(f, "job"),
            Machine::Execution => write!(f, "execution"),
        }
    }
}

/// Document lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl DocumentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Pending => "pending",
            DocumentState::Queued => "queued",
            DocumentState::Processing => "processing",
            DocumentState::Completed => "completed",
            DocumentState::Failed => "failed",
            DocumentState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DocumentState::Completed | DocumentState::Failed | DocumentState::Cancelled
        )
    }
}

impl std::fmt::Display for DocumentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for DocumentState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DocumentState::Pending),
            "queued" => Ok(DocumentState::Queued),
            "processing" => Ok(DocumentState::Processing),
            "completed" => Ok(DocumentState::Completed),
            "failed" => Ok(DocumentState::Failed),
            "cancelled" => Ok(DocumentState::Cancelled),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown document state: {}",
                s
            ))),
        }
    }
}

/// Document job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    /// `failed` is terminal for scheduling purposes even though the retry
    /// policy may re-queue it while attempts remain.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "queued" => Ok(JobState::Queued),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cancelled" => Ok(JobState::Cancelled),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown job state: {}",
                s
            ))),
        }
    }
}

/// Processor execution lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Pending => "pending",
            ExecutionState::Running => "running",
            ExecutionState::Completed => "completed",
            ExecutionState::Failed => "failed",
            ExecutionState::Skipped => "skipped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Completed | ExecutionState::Failed | ExecutionState::Skipped
        )
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ExecutionState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ExecutionState::Pending),
            "running" => Ok(ExecutionState::Running),
            "completed" => Ok(ExecutionState::Completed),
            "failed" => Ok(ExecutionState::Failed),
            "skipped" => Ok(ExecutionState::Skipped),
            _ => Err(EngineError::invalid_config(format!(
                "Unknown execution state: {}",
                s
            ))),
        }
    }
}

/// The allow-list. Every `(machine, from, to)` pair persisted anywhere in
/// the engine must appear here. The `failed -> failed` job self-loop is the
/// one deliberate exception to strict progression: re-marking a job failed
/// when retries are exhausted must be idempotent.
static ALLOWED_TRANSITIONS: &[(Machine, &str, &str)] = &[
    // Document
    (Machine::Document, "pending", "queued"),
    (Machine::Document, "queued", "processing"),
    (Machine::Document, "processing", "completed"),
    (Machine::Document, "processing", "failed"),
    (Machine::Document, "pending", "cancelled"),
    (Machine::Document, "queued", "cancelled"),
    (Machine::Document, "processing", "cancelled"),
    // DocumentJob
    (Machine::Job, "pending", "queued"),
    (Machine::Job, "queued", "running"),
    (Machine::Job, "running", "completed"),
    (Machine::Job, "running", "failed"),
    (Machine::Job, "failed", "queued"),
    (Machine::Job, "failed", "failed"),
    (Machine::Job, "pending", "cancelled"),
    (Machine::Job, "queued", "cancelled"),
    (Machine::Job, "running", "cancelled"),
    // ProcessorExecution
    (Machine::Execution, "pending", "running"),
    (Machine::Execution, "running", "completed"),
    (Machine::Execution, "running", "failed"),
    (Machine::Execution, "pending", "skipped"),
];

/// Checks whether a transition is in the allow-list.
pub fn can_transition(machine: Machine, from: &str, to: &str) -> bool {
    ALLOWED_TRANSITIONS
        .iter()
        .any(|(m, f, t)| *m == machine && *f == from && *t == to)
}

/// Guards a transition, rejecting anything not in the allow-list.
pub fn ensure_transition(machine: Machine, from: &str, to: &str) -> Result<(), EngineError> {
    if can_transition(machine, from, to) {
        Ok(())
    } else {
        Err(EngineError::transition_rejected(
            machine.to_string(),
            from,
            to,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_happy_path_is_legal() {
        for (from, to) in [
            ("pending", "queued"),
            ("queued", "processing"),
            ("processing", "completed"),
        ] {
            assert!(can_transition(Machine::Document, from, to), "{from}->{to}");
        }
    }

    #[test]
    fn terminal_document_states_admit_no_exit() {
        for terminal in ["completed", "failed", "cancelled"] {
            for to in ["pending", "queued", "processing", "completed", "failed"] {
                assert!(
                    !can_transition(Machine::Document, terminal, to),
                    "{terminal}->{to} must be rejected"
                );
            }
        }
    }

    #[test]
    fn job_retry_loop_is_legal() {
        assert!(can_transition(Machine::Job, "running", "failed"));
        assert!(can_transition(Machine::Job, "failed", "queued"));
        assert!(can_transition(Machine::Job, "queued", "running"));
    }

    #[test]
    fn job_failed_self_loop_is_the_only_self_loop() {
        assert!(can_transition(Machine::Job, "failed", "failed"));
        for machine in [Machine::Document, Machine::Job, Machine::Execution] {
            for state in ["pending", "queued", "running", "processing", "completed", "cancelled", "skipped"] {
                assert!(
                    !can_transition(machine, state, state),
                    "{machine} {state}->{state} must be rejected"
                );
            }
        }
    }

    #[test]
    fn cancellation_is_allowed_from_all_non_terminal_job_states() {
        for from in ["pending", "queued", "running"] {
            assert!(can_transition(Machine::Job, from, "cancelled"));
        }
        assert!(!can_transition(Machine::Job, "completed", "cancelled"));
        assert!(!can_transition(Machine::Job, "cancelled", "cancelled"));
    }

    #[test]
    fn ensure_transition_rejects_loudly() {
        let err = ensure_transition(Machine::Execution, "completed", "running").unwrap_err();
        match err {
            EngineError::StateTransitionRejected { machine, from, to } => {
                assert_eq!(machine, "execution");
                assert_eq!(from, "completed");
                assert_eq!(to, "running");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn state_round_trips_through_strings() {
        use std::str::FromStr;
        for s in ["pending", "queued", "running", "completed", "failed", "cancelled"] {
            assert_eq!(JobState::from_str(s).unwrap().as_str(), s);
        }
        for s in ["pending", "running", "completed", "failed", "skipped"] {
            assert_eq!(ExecutionState::from_str(s).unwrap().as_str(), s);
        }
    }
}
