//! Remote run types.
//!
//! A `Run` is one asynchronous execution of an agent against a thread's
//! accumulated messages. Runs are transient, one-shot objects: created when
//! a message is submitted, polled to a terminal state, then discarded. They
//! are never persisted across restarts.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Remote execution status of a run.
///
/// Wire strings follow the remote contract: `queued`, `in_progress`,
/// `completed`, `failed`, `cancelled`, `expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Expired,
}

impl RunStatus {
    /// Whether the remote system will make no further progress on this run.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Queued | RunStatus::InProgress)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
        };
        write!(f, "{s}")
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(RunStatus::Queued),
            "in_progress" => Ok(RunStatus::InProgress),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            "expired" => Ok(RunStatus::Expired),
            other => Err(format!("unknown run status: '{other}'")),
        }
    }
}

/// A point-in-time view of a run as reported by the remote system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub status: RunStatus,
    /// Remote-reported error text, present only in failure states.
    pub last_error: Option<String>,
}

/// One remote execution of an agent against a thread.
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    pub status: RunStatus,
    pub last_error: Option<String>,
}

impl Run {
    /// A freshly submitted run, before the first poll.
    pub fn submitted(id: impl Into<String>, thread_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            thread_id: thread_id.into(),
            status: RunStatus::Queued,
            last_error: None,
        }
    }

    /// Fold a polled state into this run.
    pub fn observe(&mut self, state: RunState) {
        self.status = state.status;
        if state.last_error.is_some() {
            self.last_error = state.last_error;
        }
    }
}
