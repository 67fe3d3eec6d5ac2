//! Anthropic Messages API provider.
//!
//! Reference [`Provider`] implementation. Translates the neutral
//! transcript/declaration types into the Messages API wire format and
//! normalizes responses back into [`ProviderResponse`]:
//!
//! - `FunctionDeclaration` → `tools[]` entries (`input_schema`)
//! - `Model` entries with calls → assistant `tool_use` content blocks
//! - `FunctionResults` entries → user `tool_result` content blocks
//! - `thinking` content blocks → reasoning parts, kept out of the text
//! - HTTP status → typed [`ProviderError`] (429 rate-limited, 529/503
//!   overloaded, other 5xx unavailable, 4xx invalid request)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ProviderConfig;

use super::{
    FunctionCall, FunctionDeclaration, Provider, ProviderError, ProviderResponse, ReasoningLevel,
    TranscriptEntry,
};
use crate::trace::Usage;

/// Default Anthropic API base URL.
const DEFAULT_API_HOST: &str = "https://api.anthropic.com";

// ── API request types ────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    thinking_type: String,
    budget_tokens: u32,
}

/// Content block, shared between requests and responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Unknown,
}

// ── API response types ───────────────────────────────────

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ── AnthropicProvider ────────────────────────────────────

/// Client for the Anthropic Messages API.
pub struct AnthropicProvider {
    client: Client,
    config: ProviderConfig,
    host: String,
}

impl AnthropicProvider {
    /// Creates a provider from configuration.
    ///
    /// If `config.host` is `None`, defaults to the public API host.
    pub fn new(config: ProviderConfig) -> Self {
        let host = config
            .host
            .clone()
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());
        // Strip trailing slash for consistent URL construction
        let host = host.trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            config,
            host,
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn generate(
        &self,
        transcript: &[TranscriptEntry],
        declarations: &[FunctionDeclaration],
        reasoning: ReasoningLevel,
    ) -> Result<ProviderResponse, ProviderError> {
        let tools = if declarations.is_empty() {
            None
        } else {
            Some(
                declarations
                    .iter()
                    .map(|d| ApiTool {
                        name: d.name.clone(),
                        description: d.description.clone(),
                        input_schema: d.parameters.clone(),
                    })
                    .collect(),
            )
        };

        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens_per_request,
            messages: translate_transcript(transcript),
            tools,
            thinking: thinking_config(reasoning, self.config.max_tokens_per_request),
        };

        debug!(
            "Calling Anthropic API ({}) with {} entries{}",
            self.config.model,
            transcript.len(),
            if declarations.is_empty() { "" } else { " + tools" }
        );

        let response = self
            .client
            .post(format!("{}/v1/messages", self.host))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), body));
        }

        let resp: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("malformed response body: {e}")))?;

        let mut out = ProviderResponse::default();
        for block in resp.content {
            match block {
                ContentBlock::Text { text } => {
                    if !text.is_empty() {
                        out.text_parts.push(text);
                    }
                }
                ContentBlock::ToolUse { id, name, input } => {
                    out.function_calls.push(FunctionCall {
                        id,
                        name,
                        arguments: input,
                    });
                }
                ContentBlock::Thinking { thinking } => {
                    if !thinking.is_empty() {
                        out.reasoning_parts.push(thinking);
                    }
                }
                ContentBlock::ToolResult { .. } | ContentBlock::Unknown => {}
            }
        }

        if let Some(usage) = resp.usage {
            out.usage = Usage {
                total_tokens: usage.input_tokens + usage.output_tokens,
                reasoning_tokens: None,
            };
            info!(
                "Provider response: {} in / {} out tokens",
                usage.input_tokens, usage.output_tokens
            );
        }

        Ok(out)
    }

    fn description(&self) -> String {
        format!("{} ({})", self.config.provider, self.config.model)
    }
}

/// Thinking budget per reasoning level. `Minimal` disables thinking;
/// budgets stay below `max_tokens` as the API requires.
fn thinking_config(reasoning: ReasoningLevel, max_tokens: u32) -> Option<ThinkingConfig> {
    let budget = match reasoning {
        ReasoningLevel::Minimal => return None,
        ReasoningLevel::Low => 1024,
        ReasoningLevel::Medium => 2048,
        ReasoningLevel::High => 4096,
    };
    Some(ThinkingConfig {
        thinking_type: "enabled".to_string(),
        budget_tokens: budget.min(max_tokens.saturating_sub(1024).max(1024)),
    })
}

/// Maps a non-success HTTP status to a typed provider error.
fn classify_status(status: u16, body: String) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited(body),
        503 | 529 => ProviderError::Overloaded(body),
        500..=599 => ProviderError::Unavailable(format!("HTTP {status}: {body}")),
        _ => ProviderError::InvalidRequest(format!("HTTP {status}: {body}")),
    }
}

/// Maps reqwest transport failures to a typed provider error.
fn classify_transport(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(std::time::Duration::from_secs(0))
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Translates the neutral transcript into Messages API messages.
///
/// `Model` entries become assistant messages whose tool_use blocks
/// must be echoed back verbatim; `FunctionResults` entries become user
/// messages of tool_result blocks, payload serialized as JSON text.
fn translate_transcript(entries: &[TranscriptEntry]) -> Vec<ApiMessage> {
    let mut messages = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            TranscriptEntry::User { text } => {
                messages.push(ApiMessage {
                    role: "user".to_string(),
                    content: vec![ContentBlock::Text { text: text.clone() }],
                });
            }
            TranscriptEntry::Model { text, calls } => {
                let mut content = Vec::new();
                for part in text {
                    if !part.is_empty() {
                        content.push(ContentBlock::Text { text: part.clone() });
                    }
                }
                for call in calls {
                    content.push(ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                if !content.is_empty() {
                    messages.push(ApiMessage {
                        role: "assistant".to_string(),
                        content,
                    });
                }
            }
            TranscriptEntry::FunctionResults { results } => {
                let content = results
                    .iter()
                    .map(|r| ContentBlock::ToolResult {
                        tool_use_id: r.call_id.clone(),
                        content: r.payload.to_string(),
                    })
                    .collect();
                messages.push(ApiMessage {
                    role: "user".to_string(),
                    content,
                });
            }
        }
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FunctionResult;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(host: Option<String>) -> ProviderConfig {
        ProviderConfig {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            api_key: "test-key".to_string(),
            max_tokens_per_request: 4096,
            host,
        }
    }

    // ── Construction ─────────────────────────────────────

    #[test]
    fn test_description() {
        let provider = AnthropicProvider::new(test_config(None));
        assert_eq!(provider.description(), "anthropic (claude-sonnet-4-5)");
    }

    #[test]
    fn test_default_host() {
        let provider = AnthropicProvider::new(test_config(None));
        assert_eq!(provider.host, "https://api.anthropic.com");
    }

    #[test]
    fn test_custom_host_strips_trailing_slash() {
        let provider = AnthropicProvider::new(test_config(Some("http://proxy:8080/".into())));
        assert_eq!(provider.host, "http://proxy:8080");
    }

    // ── Transcript translation ───────────────────────────

    #[test]
    fn test_translate_user_entry() {
        let messages = translate_transcript(&[TranscriptEntry::user("What's the total?")]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        let json = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "What's the total?");
    }

    #[test]
    fn test_translate_model_entry_with_calls() {
        let entry = TranscriptEntry::Model {
            text: vec!["Let me check.".to_string()],
            calls: vec![FunctionCall {
                id: "tu_1".to_string(),
                name: "get_total".to_string(),
                arguments: json!({"period": "2024-01"}),
            }],
        };
        let messages = translate_transcript(&[entry]);
        assert_eq!(messages[0].role, "assistant");
        let json = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "tool_use");
        assert_eq!(json["content"][1]["id"], "tu_1");
        assert_eq!(json["content"][1]["input"]["period"], "2024-01");
    }

    #[test]
    fn test_translate_function_results_entry() {
        let entry = TranscriptEntry::FunctionResults {
            results: vec![FunctionResult::from_result(
                "tu_1",
                "get_total",
                &Ok(json!({"total": 500})),
            )],
        };
        let messages = translate_transcript(&[entry]);
        assert_eq!(messages[0].role, "user");
        let json = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(json["content"][0]["type"], "tool_result");
        assert_eq!(json["content"][0]["tool_use_id"], "tu_1");
        let payload: Value =
            serde_json::from_str(json["content"][0]["content"].as_str().unwrap()).unwrap();
        assert_eq!(payload["ok"], true);
        assert_eq!(payload["data"]["total"], 500);
    }

    #[test]
    fn test_translate_skips_empty_model_entry() {
        let entry = TranscriptEntry::Model {
            text: vec![String::new()],
            calls: vec![],
        };
        assert!(translate_transcript(&[entry]).is_empty());
    }

    // ── Thinking configuration ───────────────────────────

    #[test]
    fn test_thinking_disabled_for_minimal() {
        assert!(thinking_config(ReasoningLevel::Minimal, 4096).is_none());
    }

    #[test]
    fn test_thinking_budgets_scale_with_level() {
        let low = thinking_config(ReasoningLevel::Low, 4096).unwrap();
        let high = thinking_config(ReasoningLevel::High, 4096).unwrap();
        assert_eq!(low.thinking_type, "enabled");
        assert!(low.budget_tokens < high.budget_tokens);
    }

    #[test]
    fn test_thinking_budget_stays_below_max_tokens() {
        let cfg = thinking_config(ReasoningLevel::High, 2048).unwrap();
        assert!(cfg.budget_tokens < 2048);
    }

    // ── Status classification ────────────────────────────

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(429, String::new()),
            ProviderError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(529, String::new()),
            ProviderError::Overloaded(_)
        ));
        assert!(matches!(
            classify_status(503, String::new()),
            ProviderError::Overloaded(_)
        ));
        assert!(matches!(
            classify_status(500, String::new()),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(400, String::new()),
            ProviderError::InvalidRequest(_)
        ));
    }

    // ── Response parsing ─────────────────────────────────

    #[test]
    fn test_response_parsing_mixed_blocks() {
        let json = r#"{
            "content": [
                {"type": "thinking", "thinking": "The user wants January."},
                {"type": "text", "text": "Checking now."},
                {"type": "tool_use", "id": "tu_1", "name": "get_total",
                 "input": {"period": "2024-01"}}
            ],
            "usage": {"input_tokens": 100, "output_tokens": 40}
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content.len(), 3);
        assert_eq!(resp.usage.unwrap().output_tokens, 40);
    }

    #[test]
    fn test_response_parsing_unknown_block_tolerated() {
        let json = r#"{
            "content": [
                {"type": "server_tool_use", "id": "x", "name": "y"},
                {"type": "text", "text": "Hello"}
            ]
        }"#;
        let resp: MessagesResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(resp.content[0], ContentBlock::Unknown));
        assert!(matches!(resp.content[1], ContentBlock::Text { .. }));
    }

    // ── Wire-level tests ─────────────────────────────────

    async fn mock_provider(server: &MockServer) -> AnthropicProvider {
        AnthropicProvider::new(test_config(Some(server.uri())))
    }

    #[tokio::test]
    async fn test_generate_returns_function_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "text", "text": "Let me look that up."},
                    {"type": "tool_use", "id": "tu_1", "name": "get_total",
                     "input": {"period": "2024-01"}}
                ],
                "usage": {"input_tokens": 120, "output_tokens": 30}
            })))
            .mount(&server)
            .await;

        let provider = mock_provider(&server).await;
        let declarations = vec![FunctionDeclaration {
            name: "get_total".to_string(),
            description: "Total revenue".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }];

        let resp = provider
            .generate(
                &[TranscriptEntry::user("total for january?")],
                &declarations,
                ReasoningLevel::Minimal,
            )
            .await
            .unwrap();

        assert_eq!(resp.text_parts, vec!["Let me look that up."]);
        assert_eq!(resp.function_calls.len(), 1);
        assert_eq!(resp.function_calls[0].name, "get_total");
        assert_eq!(resp.function_calls[0].arguments["period"], "2024-01");
        assert_eq!(resp.usage.total_tokens, 150);
    }

    #[tokio::test]
    async fn test_generate_separates_reasoning_from_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [
                    {"type": "thinking", "thinking": "Sum both months."},
                    {"type": "text", "text": "Total: 500"}
                ],
                "usage": {"input_tokens": 10, "output_tokens": 5}
            })))
            .mount(&server)
            .await;

        let provider = mock_provider(&server).await;
        let resp = provider
            .generate(&[TranscriptEntry::user("q")], &[], ReasoningLevel::Low)
            .await
            .unwrap();

        assert_eq!(resp.text_parts, vec!["Total: 500"]);
        assert_eq!(resp.reasoning_parts, vec!["Sum both months."]);
        assert!(resp.function_calls.is_empty());
    }

    #[tokio::test]
    async fn test_generate_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let provider = mock_provider(&server).await;
        let err = provider
            .generate(&[TranscriptEntry::user("q")], &[], ReasoningLevel::Minimal)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited(_)));
        assert!(err.to_string().contains("slow down"));
    }

    #[tokio::test]
    async fn test_generate_overloaded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded_error"))
            .mount(&server)
            .await;

        let provider = mock_provider(&server).await;
        let err = provider
            .generate(&[TranscriptEntry::user("q")], &[], ReasoningLevel::Minimal)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Overloaded(_)));
    }
}
