//! Skill registry — the set of capabilities available to one conversation.
//!
//! The registry is built once at session setup and stays immutable for
//! the session's lifetime, so concurrent function calls within a step
//! can share it without locks. It is also the single boundary where
//! untrusted skill code is contained: unknown names, invalid
//! arguments, and panics all come back as structured [`SkillError`]s,
//! never as a crash of the dispatch loop.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::bail;
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use crate::provider::FunctionDeclaration;
use crate::schema;

use super::{Skill, SkillContext, SkillError, SkillResult};

pub struct SkillRegistry {
    /// Registration order, preserved in `declarations()`.
    skills: Vec<Arc<dyn Skill>>,
    by_name: HashMap<String, usize>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self {
            skills: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registers a skill. A name collision is a configuration error
    /// and fails at setup, not at call time.
    pub fn register(&mut self, skill: Arc<dyn Skill>) -> anyhow::Result<()> {
        let name = skill.name().to_string();
        if self.by_name.contains_key(&name) {
            bail!("duplicate skill name: '{name}'");
        }
        self.by_name.insert(name, self.skills.len());
        self.skills.push(skill);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.by_name.get(name).map(|&i| &self.skills[i])
    }

    /// Function declarations for the provider, one per registered
    /// skill in registration order. Parameter schemas are generated
    /// through the schema translator, never hand-authored.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.skills
            .iter()
            .map(|skill| FunctionDeclaration {
                name: skill.name().to_string(),
                description: skill.description().to_string(),
                parameters: schema::to_provider_schema(&skill.input_schema()),
            })
            .collect()
    }

    /// Executes a skill by name with raw provider-supplied arguments.
    ///
    /// Never panics and never errors out of band:
    /// - unknown name → `not_found` failure
    /// - arguments violating the input schema → `validation` failure
    ///   enumerating the offending fields (the skill is not invoked)
    /// - a panic inside the skill → `internal` failure carrying the
    ///   panic message
    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        context: &SkillContext,
    ) -> SkillResult<Value> {
        let Some(skill) = self.get(name) else {
            return Err(SkillError::not_found(format!("unknown skill: '{name}'")));
        };

        if let Err(problems) = schema::validate_args(&skill.input_schema(), &args) {
            return Err(SkillError::validation(format!(
                "invalid arguments: {}",
                problems.join("; ")
            )));
        }

        debug!(skill = name, tenant = %context.tenant, "Executing skill");

        match std::panic::AssertUnwindSafe(skill.execute(args, context))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(SkillError::internal(format!(
                "skill '{name}' panicked: {}",
                panic_message(&panic)
            ))),
        }
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
