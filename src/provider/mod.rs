//! Provider boundary — abstraction over generative-model backends.
//!
//! The dispatch loop depends only on this shape: a transcript plus a
//! palette of callable function declarations goes in, text and/or
//! function-call requests come out. Vendors implement [`Provider`] to
//! translate these types into their own wire format (see
//! [`anthropic`] for the reference adapter).

pub mod anthropic;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::skills::SkillResult;
use crate::trace::Usage;

pub use anthropic::AnthropicProvider;

/// Reasoning effort the provider should spend before answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningLevel {
    Minimal,
    #[default]
    Low,
    Medium,
    High,
}

/// Read-only projection of a skill for the provider.
///
/// Always generated from a skill's declared schema via the schema
/// translator, never hand-authored.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A provider's request to invoke a named skill with arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Provider-assigned call id, echoed back in the result entry.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// Outcome of one function call, folded back into the transcript.
///
/// The payload is the success/failure envelope —
/// `{"ok": true, "data": ...}` or
/// `{"ok": false, "error": {"kind": ..., "message": ...}}` — so the
/// model can react to failures as conversational content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResult {
    pub call_id: String,
    pub name: String,
    pub payload: Value,
}

impl FunctionResult {
    pub fn from_result(call_id: &str, name: &str, result: &SkillResult<Value>) -> Self {
        let payload = match result {
            Ok(data) => json!({"ok": true, "data": data}),
            Err(e) => json!({
                "ok": false,
                "error": {"kind": e.kind.as_str(), "message": e.message}
            }),
        };
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            payload,
        }
    }
}

/// One role-tagged entry in a turn's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum TranscriptEntry {
    User {
        text: String,
    },
    Model {
        #[serde(default)]
        text: Vec<String>,
        #[serde(default)]
        calls: Vec<FunctionCall>,
    },
    FunctionResults {
        results: Vec<FunctionResult>,
    },
}

impl TranscriptEntry {
    pub fn user(text: impl Into<String>) -> Self {
        TranscriptEntry::User { text: text.into() }
    }
}

/// Normalized provider response.
#[derive(Debug, Default)]
pub struct ProviderResponse {
    /// Answer text parts (reasoning excluded).
    pub text_parts: Vec<String>,
    /// Summarized reasoning/"thinking" content, when exposed.
    pub reasoning_parts: Vec<String>,
    /// Function-call requests; empty means the turn's answer is text.
    pub function_calls: Vec<FunctionCall>,
    pub usage: Usage,
}

/// Failures of a single provider request.
///
/// Transient variants are eligible for the retry wrapper; the rest
/// propagate immediately.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// True for failures expected to succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited(_)
                | ProviderError::Overloaded(_)
                | ProviderError::Network(_)
                | ProviderError::Timeout(_)
        )
    }
}

/// Abstraction over generative-model backends.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Sends the transcript to the model and returns the normalized
    /// response.
    ///
    /// When `declarations` is empty the request goes out with function
    /// calling disabled — the forced-finalization mode of the dispatch
    /// loop relies on this.
    async fn generate(
        &self,
        transcript: &[TranscriptEntry],
        declarations: &[FunctionDeclaration],
        reasoning: ReasoningLevel,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Human-readable description of the provider and model.
    ///
    /// Used in status output, e.g. `"anthropic (claude-sonnet-4-5)"`.
    fn description(&self) -> String;
}
