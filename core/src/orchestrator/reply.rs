//! Result of one orchestrated turn

use serde::{Deserialize, Serialize};

/// How a turn ended
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ReplyOutcome {
    /// The model produced a final text answer
    Answered,

    /// The round-trip cap was reached while the model still requested tools
    Truncated,

    /// The model backend failed; the cause is kept for callers that want it
    BackendFailure(String),

    /// The last model turn had no usable text
    MalformedResponse,
}

/// What `respond` hands back to the presentation layer. `text` is always displayable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    /// Text to show the user
    pub text: String,

    pub outcome: ReplyOutcome,

    /// Tool round-trips completed during the turn
    pub round_trips: usize,

    /// Wall time of the turn in milliseconds
    pub duration_ms: u64,
}

impl Reply {
    pub fn answered(text: String, round_trips: usize, duration_ms: u64) -> Self {
        Self {
            text,
            outcome: ReplyOutcome::Answered,
            round_trips,
            duration_ms,
        }
    }

    pub fn truncated(text: String, round_trips: usize, duration_ms: u64) -> Self {
        Self {
            text,
            outcome: ReplyOutcome::Truncated,
            round_trips,
            duration_ms,
        }
    }

    pub fn backend_failure(cause: String, round_trips: usize, duration_ms: u64) -> Self {
        Self {
            text: format!("Error processing request: {}", cause),
            outcome: ReplyOutcome::BackendFailure(cause),
            round_trips,
            duration_ms,
        }
    }

    pub fn malformed(text: String, round_trips: usize, duration_ms: u64) -> Self {
        Self {
            text,
            outcome: ReplyOutcome::MalformedResponse,
            round_trips,
            duration_ms,
        }
    }

    pub fn is_answered(&self) -> bool {
        self.outcome == ReplyOutcome::Answered
    }
}
