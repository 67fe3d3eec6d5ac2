pub mod error;
pub mod registry;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use error::{ErrorKind, SkillError, SkillResult};
pub use registry::SkillRegistry;

/// Per-invocation, tenant-scoped context passed to skill execution.
///
/// Holds the tenant label plus whatever capability handles the caller
/// wants skills to reach (a data-provider connection, a credential
/// vault handle). The dispatch core never looks inside the capability
/// map — it only passes the context through, one instance per tenant
/// and turn.
pub struct SkillContext {
    /// Identifier of the tenant this turn runs for.
    pub tenant: String,
    capabilities: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl SkillContext {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            capabilities: HashMap::new(),
        }
    }

    /// Attaches a capability handle, keyed by its type.
    /// Inserting the same type twice replaces the previous handle.
    pub fn provide<T: Any + Send + Sync>(&mut self, capability: T) -> &mut Self {
        self.capabilities.insert(TypeId::of::<T>(), Arc::new(capability));
        self
    }

    /// Retrieves a capability handle by type, if the caller provided one.
    pub fn capability<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.capabilities
            .get(&TypeId::of::<T>())
            .and_then(|c| c.downcast_ref::<T>())
    }
}

/// A deterministic capability the model can invoke via function calling.
///
/// Every skill — whatever business query it wraps — implements this
/// trait. The registry validates call arguments against
/// `input_schema()` before `execute()` runs, so implementations may
/// assume the declared shape.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Unique identifier used in the provider's function declarations.
    /// Must be lowercase alphanumeric + underscores (e.g. "get_total").
    fn name(&self) -> &str;

    /// Human-readable description shown to the model so it knows
    /// when to invoke this skill.
    fn description(&self) -> &str;

    /// Grouping tag for related skills (e.g. "sales", "inventory").
    fn tool(&self) -> &str {
        "general"
    }

    /// Declared input shape: primitives, objects, arrays, enums,
    /// optional/required fields, numeric bounds. Translated into the
    /// provider's parameter schema by [`crate::schema::to_provider_schema`].
    fn input_schema(&self) -> Value;

    /// Execute the skill with validated input and return a structured
    /// result. Expected failures (auth, not found, upstream trouble)
    /// come back as a `SkillResult` failure — never a panic. The
    /// returned value is folded into the transcript for the model.
    async fn execute(&self, input: Value, context: &SkillContext) -> SkillResult<Value>;
}
