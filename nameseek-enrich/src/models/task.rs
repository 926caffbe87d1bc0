//! Classification task lifecycle
//!
//! A `ClassificationTask` is owned by exactly one dispatcher future; the
//! retry controller advances its `attempt` counter and state.

use super::classification::ClassificationResult;
use super::name_record::NameRecord;
use crate::error::{FailureKind, ProviderError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task state machine: Pending -> InFlight -> (Succeeded | Failed)
///
/// A task returns to Pending between attempts while it waits out a backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

/// One name being classified
#[derive(Debug, Clone)]
pub struct ClassificationTask {
    pub record: NameRecord,
    /// Adapter calls started so far
    pub attempt: u32,
    pub state: TaskState,
}

impl ClassificationTask {
    pub fn new(record: NameRecord) -> Self {
        Self {
            record,
            attempt: 0,
            state: TaskState::Pending,
        }
    }
}

/// Permanent per-task failure as recorded in checkpoint and summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ProviderError> for TaskFailure {
    fn from(err: &ProviderError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Terminal outcome of a task; exactly what gets checkpointed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TerminalOutcome {
    Succeeded { result: ClassificationResult },
    Failed { kind: FailureKind, message: String },
}

impl TerminalOutcome {
    pub fn failed(failure: TaskFailure) -> Self {
        TerminalOutcome::Failed {
            kind: failure.kind,
            message: failure.message,
        }
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            TerminalOutcome::Succeeded { result } => Some(result),
            TerminalOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<TaskFailure> {
        match self {
            TerminalOutcome::Succeeded { .. } => None,
            TerminalOutcome::Failed { kind, message } => Some(TaskFailure {
                kind: *kind,
                message: message.clone(),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TerminalOutcome::Succeeded { .. })
    }
}

/// What a dispatched task produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Reached a terminal state and was checkpointed
    Terminal(TerminalOutcome),
    /// Stopped by run cancellation before reaching a terminal state;
    /// nothing was checkpointed
    Interrupted,
}

/// Per-record dispatcher output, in submission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub record: NameRecord,
    pub attempts: u32,
    pub outcome: TaskOutcome,
}

impl TaskReport {
    pub fn interrupted(record: NameRecord, attempts: u32) -> Self {
        Self {
            record,
            attempts,
            outcome: TaskOutcome::Interrupted,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Interrupted)
    }
}
