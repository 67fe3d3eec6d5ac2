//! The dispatch loop — core of the runtime.
//!
//! Drives one conversation turn: send the transcript plus the
//! registry's function declarations to the provider; plain text ends
//! the turn; function-call requests are executed concurrently, folded
//! back into the transcript, and the loop repeats, bounded by
//! `max_steps`. On exhausting the budget the model gets exactly one
//! more request with function calling disabled; if that still yields
//! nothing usable, a fixed fallback message is returned. The final
//! answer is never empty.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::error::DispatchError;
use crate::provider::{
    FunctionCall, FunctionDeclaration, FunctionResult, Provider, ProviderError, ProviderResponse,
    TranscriptEntry,
};
use crate::retry::with_retry;
use crate::sanitize::truncate_trailing_repetition;
use crate::skills::{SkillContext, SkillError, SkillRegistry};
use crate::trace::{ToolCallRecord, TurnTrace, Usage};

/// Answer returned when even the forced finalization yields no text.
pub const FALLBACK_TEXT: &str =
    "I wasn't able to put together a complete answer to this question. \
     Please try rephrasing it, or ask for a smaller part of it.";

/// Orchestrates conversation turns against one provider.
pub struct DispatchEngine {
    provider: Arc<dyn Provider>,
    config: DispatchConfig,
}

impl DispatchEngine {
    pub fn new(provider: Arc<dyn Provider>, config: DispatchConfig) -> Self {
        Self { provider, config }
    }

    /// Runs one full turn of the dispatch loop.
    ///
    /// `transcript` already contains the user's question (and any
    /// history the caller wants the model to see). The registry and
    /// context are shared read-only with every function call of the
    /// turn. Returns the turn's trace, or a classified error when the
    /// provider fails terminally — skill failures never surface here.
    pub async fn run_turn(
        &self,
        mut transcript: Vec<TranscriptEntry>,
        registry: Arc<SkillRegistry>,
        context: Arc<SkillContext>,
    ) -> Result<TurnTrace, DispatchError> {
        let declarations = registry.declarations();
        let mut tool_calls: Vec<ToolCallRecord> = Vec::new();
        let mut reasoning: Vec<String> = Vec::new();
        let mut usage = Usage::default();
        let mut steps: u32 = 0;

        info!(
            skills = registry.len(),
            max_steps = self.config.max_steps,
            "Starting dispatch turn"
        );

        for step in 0..self.config.max_steps {
            let response = self.request(&transcript, &declarations).await?;
            steps += 1;
            usage.accumulate(&response.usage);
            reasoning.extend(response.reasoning_parts);

            if response.function_calls.is_empty() {
                info!(steps, tool_calls = tool_calls.len(), "Turn completed");
                return Ok(self.finish(
                    response.text_parts.join("\n"),
                    reasoning,
                    usage,
                    tool_calls,
                    steps,
                ));
            }

            debug!(
                step,
                calls = response.function_calls.len(),
                "Executing requested function calls"
            );

            let results = self
                .execute_calls(&response.function_calls, &registry, &context, &mut tool_calls)
                .await;

            transcript.push(TranscriptEntry::Model {
                text: response.text_parts,
                calls: response.function_calls,
            });
            transcript.push(TranscriptEntry::FunctionResults { results });
        }

        // Budget exhausted: one last request with function calling
        // disabled, nudging the model to answer from what it has.
        warn!(
            max_steps = self.config.max_steps,
            "Step budget exhausted, forcing text-only finalization"
        );
        transcript.push(TranscriptEntry::user(
            self.config.force_text_instruction.as_str(),
        ));

        let response = self.request(&transcript, &[]).await?;
        steps += 1;
        usage.accumulate(&response.usage);
        reasoning.extend(response.reasoning_parts);

        Ok(self.finish(
            response.text_parts.join("\n"),
            reasoning,
            usage,
            tool_calls,
            steps,
        ))
    }

    /// One provider request through the retry wrapper, with the
    /// per-request deadline counted as a transient failure.
    async fn request(
        &self,
        transcript: &[TranscriptEntry],
        declarations: &[FunctionDeclaration],
    ) -> Result<ProviderResponse, DispatchError> {
        let deadline = self.config.provider_timeout();
        with_retry(&self.config.retry, || async move {
            match timeout(
                deadline,
                self.provider
                    .generate(transcript, declarations, self.config.reasoning_level),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(deadline)),
            }
        })
        .await
        .map_err(DispatchError::from)
    }

    /// Executes all function calls of one step concurrently.
    ///
    /// Each call runs as a detached task: a failing or slow call never
    /// blocks its siblings, and a cancelled turn stops scheduling new
    /// steps without aborting work already in flight. Results come
    /// back in request order, successes and failures alike.
    async fn execute_calls(
        &self,
        calls: &[FunctionCall],
        registry: &Arc<SkillRegistry>,
        context: &Arc<SkillContext>,
        records: &mut Vec<ToolCallRecord>,
    ) -> Vec<FunctionResult> {
        let skill_timeout = self.config.skill_timeout();

        let handles: Vec<_> = calls
            .iter()
            .map(|call| {
                let registry = Arc::clone(registry);
                let context = Arc::clone(context);
                let name = call.name.clone();
                let args = call.arguments.clone();
                tokio::spawn(async move {
                    let started_at = Utc::now();
                    let start = Instant::now();
                    let outcome =
                        match timeout(skill_timeout, registry.execute(&name, args, &context)).await
                        {
                            Ok(outcome) => outcome,
                            Err(_) => Err(SkillError::upstream(format!(
                                "skill '{name}' timed out after {}s",
                                skill_timeout.as_secs()
                            ))),
                        };
                    (outcome, start.elapsed(), started_at)
                })
            })
            .collect();

        let joined = join_all(handles).await;

        let mut results = Vec::with_capacity(calls.len());
        for (call, outcome) in calls.iter().zip(joined) {
            let (outcome, elapsed, started_at) = match outcome {
                Ok(completed) => completed,
                // The registry already contains panics; this covers the
                // task itself dying.
                Err(e) => (
                    Err(SkillError::internal(format!("execution task failed: {e}"))),
                    std::time::Duration::ZERO,
                    Utc::now(),
                ),
            };

            if let Err(ref e) = outcome {
                warn!(skill = %call.name, kind = e.kind.as_str(), "Function call failed: {}", e.message);
            }

            records.push(ToolCallRecord::new(
                call.name.as_str(),
                call.arguments.clone(),
                &outcome,
                elapsed.as_millis() as u64,
                started_at,
            ));
            results.push(FunctionResult::from_result(&call.id, &call.name, &outcome));
        }
        results
    }

    /// Sanitizes the answer and seals the trace. The final text is
    /// never empty.
    fn finish(
        &self,
        text: String,
        reasoning: Vec<String>,
        usage: Usage,
        tool_calls: Vec<ToolCallRecord>,
        steps: u32,
    ) -> TurnTrace {
        let sanitized = truncate_trailing_repetition(text.trim());
        let final_text = if sanitized.is_empty() {
            FALLBACK_TEXT.to_string()
        } else {
            sanitized
        };

        let thinking_summary = if reasoning.is_empty() {
            None
        } else {
            Some(reasoning.join("\n"))
        };

        TurnTrace {
            final_text,
            thinking_summary,
            usage,
            tool_calls,
            steps,
        }
    }
}
