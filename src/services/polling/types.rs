use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::search::SearchResponse;

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 10;
pub const AUTO_POLLING_STORAGE_KEY: &str = "autoPolling";
/// One day; longer periods are not meaningful for an alert view
pub const MAX_REFRESH_INTERVAL_SECS: u64 = 86_400;

/// Accepts `1..=MAX_REFRESH_INTERVAL_SECS`
pub fn validate_interval(seconds: u64) -> Result<(), PollingError> {
    if seconds == 0 || seconds > MAX_REFRESH_INTERVAL_SECS {
        return Err(PollingError::InvalidInterval(seconds));
    }
    Ok(())
}

/// Polling configuration that survives restarts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    #[serde(alias = "isActive")]
    pub active: bool,
    #[serde(rename = "refreshInterval")]
    pub refresh_interval: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL_SECS,
        }
    }
}

impl PollingConfig {
    pub fn validate(&self) -> Result<(), PollingError> {
        validate_interval(self.refresh_interval)
    }
}

/// Session-scoped flags, never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeState {
    /// Queries of the current cycle that have not completed yet. A timer
    /// reset starts a new cycle and stops counting the older queries.
    pub outstanding: usize,
    pub congested: bool,
    pub suppressed: bool,
}

impl RuntimeState {
    pub fn pending(&self) -> bool {
        self.outstanding > 0
    }
}

/// What caused a query to be issued
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryOrigin {
    /// Issued synchronously with `start()`
    Eager,
    Tick,
}

impl QueryOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Tick => "tick",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum PollOutcome {
    Result(SearchResponse),
    Failure(String),
}

/// Published to the result sink once per completed query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollEvent {
    pub query_id: Uuid,
    pub origin: QueryOrigin,
    pub completed_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub outcome: PollOutcome,
}

impl PollEvent {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, PollOutcome::Failure(_))
    }

    pub fn response(&self) -> Option<&SearchResponse> {
        match &self.outcome {
            PollOutcome::Result(response) => Some(response),
            PollOutcome::Failure(_) => None,
        }
    }
}

/// Read-only view of the controller
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollingStatus {
    pub active: bool,
    pub refresh_interval: u64,
    pub pending: bool,
    pub congested: bool,
    pub suppressed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum PollingError {
    #[error(
        "Refresh interval must be between 1 and {max} seconds, got {0}",
        max = MAX_REFRESH_INTERVAL_SECS
    )]
    InvalidInterval(u64),
}
