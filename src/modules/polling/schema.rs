use serde::{Deserialize, Serialize};
use validator::Validate;

// =============================================================================
// INTERVAL
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SetIntervalRequest {
    #[validate(range(
        min = 1,
        max = 86_400,
        message = "Refresh interval must be between 1 second and 1 day"
    ))]
    pub seconds: u64,
}

// =============================================================================
// SUPPRESSION
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SetSuppressionRequest {
    pub suppressed: bool,
}

// =============================================================================
// STOP
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StopParams {
    #[serde(default = "default_persist")]
    pub persist: bool,
}

fn default_persist() -> bool {
    true
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: Some(message.into()),
        }
    }
}
