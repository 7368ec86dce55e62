use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type JobId = String;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Pending,
    InProgress,
    Halted,
    Done,
    Canceled,
}

impl JobState {
    pub const ALL: [JobState; 5] = [
        JobState::Pending,
        JobState::InProgress,
        JobState::Halted,
        JobState::Done,
        JobState::Canceled,
    ];

    /// Transitions orchestration is expected to drive from this state.
    /// The registry itself accepts any transition.
    pub fn allowed_next(self) -> &'static [JobState] {
        match self {
            JobState::Pending => &[JobState::InProgress, JobState::Canceled],
            JobState::InProgress => &[JobState::Halted, JobState::Done, JobState::Canceled],
            JobState::Halted => &[JobState::InProgress, JobState::Canceled],
            JobState::Done | JobState::Canceled => &[],
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Canceled)
    }

    /// Ready to be (re)started by a sweep
    pub fn is_startable(self) -> bool {
        matches!(self, JobState::Pending | JobState::Halted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Pending => "PENDING",
            JobState::InProgress => "IN_PROGRESS",
            JobState::Halted => "HALTED",
            JobState::Done => "DONE",
            JobState::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown job state: {}", s)))
    }
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: JobState,
    pub timestamp: DateTime<Utc>,
}

/// Metric snapshot reported by a running job
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub accuracy: f64,
    pub loss: f64,
}

/// Caller input for job creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub id: Option<JobId>,
    pub command: String,
    pub threshold_price: f64,
    pub description: Option<String>,
}

/// Tracked unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub command: String,
    pub description: Option<String>,
    pub threshold_price: f64,
    pub start_timestamp: DateTime<Utc>,
    pub instance_type: String,
    pub region: String,
    pub availability_zone: String,
    pub state_history: Vec<StateChange>,
    pub training: Vec<MetricSnapshot>,
    pub validation: Vec<MetricSnapshot>,
    pub epoch: Option<u32>,
    pub num_epochs: Option<u32>,
}

impl Job {
    /// Timestamp of the most recent state change
    pub fn last_changed(&self) -> DateTime<Utc> {
        self.state_history
            .last()
            .map(|change| change.timestamp)
            .unwrap_or(self.start_timestamp)
    }
}

/// Recorded market price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

/// Which data feeds the oracle's current price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceMode {
    Live,
    Override,
}

/// Full application state as reported to operators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub jobs: Vec<Job>,
    pub spot_price_history: Vec<PricePoint>,
    pub price_mode: PriceMode,
    pub on_demand_price: Option<f64>,
}
