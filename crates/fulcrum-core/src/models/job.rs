//! Job domain model.
//!
//! A job is one attempt at a service transition, dispatched to the
//! service's agent. `Pending -> Claimed -> {Completed, Failed}`; the two
//! terminal states are final.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use super::service::ServiceAction as JobAction;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Claimed,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "Pending",
            JobState::Claimed => "Claimed",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Claimed)
                | (JobState::Claimed, JobState::Completed)
                | (JobState::Claimed, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(JobState::Pending),
            "Claimed" => Ok(JobState::Claimed),
            "Completed" => Ok(JobState::Completed),
            "Failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub service_id: Uuid,
    pub agent_id: Uuid,
    pub provider_id: Uuid,
    pub broker_id: Uuid,
    pub action: JobAction,
    pub state: JobState,
    /// Lower values are served first.
    pub priority: i32,
    pub request_data: Option<serde_json::Value>,
    pub result_data: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Service retry count at the time the job was enqueued.
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJob {
    pub service_id: Uuid,
    pub agent_id: Uuid,
    pub provider_id: Uuid,
    pub broker_id: Uuid,
    pub action: JobAction,
    pub priority: i32,
    pub request_data: Option<serde_json::Value>,
    pub retry_count: u32,
}

/// Body of an agent's completion report.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompleteJob {
    pub resources: Option<serde_json::Value>,
    pub external_id: Option<String>,
}

/// Body of an agent's failure report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailJob {
    pub error_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_forward_transitions() {
        use JobState::*;
        let all = [Pending, Claimed, Completed, Failed];
        for from in all {
            for to in all {
                let expected = matches!(
                    (from, to),
                    (Pending, Claimed) | (Claimed, Completed) | (Claimed, Failed)
                );
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Claimed.is_terminal());
    }
}
