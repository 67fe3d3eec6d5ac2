use std::time::Duration;

use serde::Deserialize;

use crate::provider::ReasoningLevel;
use crate::retry::RetryConfig;

/// Top-level configuration file: `[provider]` + `[dispatch]`.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub provider: ProviderConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Provider connection settings.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub provider: String,
    pub model: String,
    /// Supports ${ENV_VAR} substitution
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens_per_request: u32,
    /// Override the provider's API base URL (tests, proxies).
    #[serde(default)]
    pub host: Option<String>,
}

/// Knobs of the dispatch loop itself.
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Maximum function-calling steps per turn. One extra text-only
    /// request is made when the budget runs out.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    #[serde(default)]
    pub reasoning_level: ReasoningLevel,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Deadline for one provider request, in seconds. Exceeding it is
    /// a transient failure, eligible for retry.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// Deadline for one skill execution, in seconds. Exceeding it is
    /// an upstream failure folded into the transcript.
    #[serde(default = "default_skill_timeout_secs")]
    pub skill_timeout_secs: u64,
    /// Instruction appended when the step budget runs out and the
    /// model is asked to answer with what it already has. A nudge, not
    /// a guarantee — the fixed fallback text covers the rest.
    #[serde(default = "default_force_text_instruction")]
    pub force_text_instruction: String,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_steps() -> u32 {
    8
}

fn default_provider_timeout_secs() -> u64 {
    120
}

fn default_skill_timeout_secs() -> u64 {
    30
}

fn default_force_text_instruction() -> String {
    "You have no function calls left for this question. Answer now using \
     only the data already gathered, without requesting any more function calls."
        .to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            reasoning_level: ReasoningLevel::default(),
            retry: RetryConfig::default(),
            provider_timeout_secs: default_provider_timeout_secs(),
            skill_timeout_secs: default_skill_timeout_secs(),
            force_text_instruction: default_force_text_instruction(),
        }
    }
}

impl DispatchConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn skill_timeout(&self) -> Duration {
        Duration::from_secs(self.skill_timeout_secs)
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        // Expand environment variables like ${ANTHROPIC_API_KEY}
        let expanded = shellexpand::env(&content)?;
        let config: Config = toml::from_str(&expanded)?;
        Ok(config)
    }
}
