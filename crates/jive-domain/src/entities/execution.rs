//! Execution record entity
//!
//! One record per execution attempt of a work item. Transitions are
//! monotonic: terminal states never re-enter a non-terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Execution lifecycle status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExecutionStatus {
    /// Created but not yet running
    Pending,
    /// Actively executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal states are immutable except for post-mortem metadata.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the machine permits `self → next`.
    #[must_use]
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        match self {
            Self::Pending => matches!(
                next,
                Self::Running | Self::Cancelled | Self::Failed | Self::Completed
            ),
            Self::Running => matches!(next, Self::Completed | Self::Failed | Self::Cancelled),
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }
}

/// How dependent work items are scheduled during execution
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ExecutionMode {
    /// One at a time, declaration order
    Sequential,
    /// All at once
    Parallel,
    /// Topological dependency order
    DependencyBased,
}

/// One execution attempt of a work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Unique execution identity
    pub execution_id: Uuid,
    /// The work item being executed
    pub work_item_id: Uuid,
    /// Current lifecycle status
    pub status: ExecutionStatus,
    /// Progress in [0, 100]
    pub progress_percentage: f64,
    /// When execution started
    pub start_time: DateTime<Utc>,
    /// When execution reached a terminal state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Failure or cancellation reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Scheduling mode
    pub execution_mode: ExecutionMode,
    /// Opaque agent context
    #[serde(default = "default_context")]
    pub agent_context: serde_json::Value,
}

fn default_context() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl ExecutionRecord {
    /// Create a new pending record.
    #[must_use]
    pub fn new(
        work_item_id: Uuid,
        mode: ExecutionMode,
        agent_context: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            work_item_id,
            status: ExecutionStatus::Pending,
            progress_percentage: 0.0,
            start_time: now,
            end_time: None,
            error_message: None,
            execution_mode: mode,
            agent_context,
        }
    }

    /// Apply a status transition, stamping `end_time` on terminal entry.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the machine forbids the transition.
    pub fn transition(&mut self, next: ExecutionStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::validation_field(
                format!("Cannot transition execution from {} to {next}", self.status),
                "status",
                Some(serde_json::Value::String(next.to_string())),
                Some(format!("a state reachable from {}", self.status)),
            ));
        }
        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(now);
            if next == ExecutionStatus::Completed {
                self.progress_percentage = 100.0;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ExecutionRecord {
        ExecutionRecord::new(
            Uuid::new_v4(),
            ExecutionMode::DependencyBased,
            serde_json::json!({}),
            Utc::now(),
        )
    }

    #[test]
    fn happy_path_transitions() {
        let mut r = record();
        r.transition(ExecutionStatus::Running, Utc::now()).unwrap();
        r.transition(ExecutionStatus::Completed, Utc::now())
            .unwrap();
        assert!(r.end_time.is_some());
        assert_eq!(r.progress_percentage, 100.0);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut r = record();
        r.transition(ExecutionStatus::Running, Utc::now()).unwrap();
        r.transition(ExecutionStatus::Cancelled, Utc::now())
            .unwrap();
        assert!(r.transition(ExecutionStatus::Running, Utc::now()).is_err());
        assert!(
            r.transition(ExecutionStatus::Completed, Utc::now())
                .is_err()
        );
    }

    #[test]
    fn cancel_allowed_from_pending() {
        let mut r = record();
        r.transition(ExecutionStatus::Cancelled, Utc::now())
            .unwrap();
        assert_eq!(r.status, ExecutionStatus::Cancelled);
        assert!(r.end_time.is_some());
    }
}
