//! Capability-dispatch runtime.
//!
//! Lets a generative model answer a question by iteratively invoking a
//! bounded palette of typed, validated skills over a tenant's data,
//! within a fixed step budget — without hanging, looping forever, or
//! crashing the caller.
//!
//! The moving parts, leaves first:
//!
//! - [`skills`] — the [`Skill`](skills::Skill) contract, the
//!   per-tenant [`SkillContext`](skills::SkillContext), and the
//!   [`SkillRegistry`](skills::SkillRegistry) that validates and
//!   executes calls by name.
//! - [`schema`] — translates a skill's declared input shape into the
//!   provider's function-parameter schema, and validates raw call
//!   arguments against it.
//! - [`retry`] — bounded backoff for transient provider failures.
//! - [`provider`] — the vendor-neutral [`Provider`](provider::Provider)
//!   boundary plus the reference Anthropic adapter.
//! - [`engine`] — the dispatch loop itself:
//!   [`DispatchEngine::run_turn`](engine::DispatchEngine::run_turn).
//! - [`sanitize`] / [`trace`] — output repetition suppression and the
//!   per-turn audit trace.
//!
//! ```no_run
//! use std::sync::Arc;
//! use skill_dispatch::{
//!     AnthropicProvider, Config, DispatchEngine, SkillContext, SkillRegistry, TranscriptEntry,
//! };
//!
//! # async fn run(my_skill: Arc<dyn skill_dispatch::Skill>) -> anyhow::Result<()> {
//! let config = Config::load("config/dispatch.toml")?;
//!
//! let mut registry = SkillRegistry::new();
//! registry.register(my_skill)?;
//!
//! let provider = Arc::new(AnthropicProvider::new(config.provider.clone()));
//! let engine = DispatchEngine::new(provider, config.dispatch.clone());
//!
//! let context = Arc::new(SkillContext::new("tenant-42"));
//! let transcript = vec![TranscriptEntry::user("What was January's total?")];
//!
//! let trace = engine.run_turn(transcript, Arc::new(registry), context).await?;
//! println!("{}", trace.final_text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod retry;
pub mod sanitize;
pub mod schema;
pub mod skills;
pub mod trace;

pub use config::{Config, DispatchConfig, ProviderConfig};
pub use engine::{DispatchEngine, FALLBACK_TEXT};
pub use error::DispatchError;
pub use provider::{
    AnthropicProvider, FunctionCall, FunctionDeclaration, FunctionResult, Provider, ProviderError,
    ProviderResponse, ReasoningLevel, TranscriptEntry,
};
pub use retry::RetryConfig;
pub use skills::{ErrorKind, Skill, SkillContext, SkillError, SkillRegistry, SkillResult};
pub use trace::{ToolCallRecord, TurnTrace, Usage};
