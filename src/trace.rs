//! Per-turn observability: tool-call records, token usage, and the
//! trace returned to the caller.
//!
//! Records are written once at call completion and never mutated;
//! downstream audit pipelines consume them as serialized JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::skills::{SkillError, SkillResult};

/// Token accounting for one provider request, accumulated across the
/// whole turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub total_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
}

impl Usage {
    /// Folds another request's usage into this turn's running total.
    pub fn accumulate(&mut self, other: &Usage) {
        self.total_tokens += other.total_tokens;
        if let Some(r) = other.reasoning_tokens {
            *self.reasoning_tokens.get_or_insert(0) += r;
        }
    }
}

/// One executed function call within a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub args: Value,
    /// Success data, when the call succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Structured failure, when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<SkillError>,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl ToolCallRecord {
    pub fn new(
        name: impl Into<String>,
        args: Value,
        outcome: &SkillResult<Value>,
        duration_ms: u64,
        started_at: DateTime<Utc>,
    ) -> Self {
        let (result, error) = match outcome {
            Ok(data) => (Some(data.clone()), None),
            Err(e) => (None, Some(e.clone())),
        };
        Self {
            name: name.into(),
            args,
            result,
            error,
            duration_ms,
            started_at,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything a turn produced, owned by the caller once the
/// orchestrator returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnTrace {
    /// The final answer. Never empty.
    pub final_text: String,
    /// Accumulated reasoning summary, when the provider exposed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_summary: Option<String>,
    pub usage: Usage,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Provider requests made during the turn (≤ max_steps + 1).
    pub steps: u32,
}
