//! Structured failure envelope for skill execution.
//!
//! Skills never panic for expected failure modes — they return a
//! [`SkillError`] whose [`ErrorKind`] is a closed enumeration the
//! dispatch loop (and the model) can reason about. Failures are
//! serializable so they travel through the transcript and the turn
//! trace as data, not as aborts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type returned by every skill and by the registry.
pub type SkillResult<T> = Result<T, SkillError>;

/// Closed set of skill failure categories.
///
/// `Validation` and `NotFound` are produced by the registry itself;
/// the rest come from skill implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The tenant is not allowed to perform the operation.
    Auth,
    /// The call arguments did not match the skill's input schema.
    Validation,
    /// Unknown skill name, or the skill's collaborator found nothing.
    NotFound,
    /// An external collaborator failed or timed out.
    Upstream,
    /// Unexpected error inside a skill (caught at the registry boundary).
    Internal,
}

impl ErrorKind {
    /// Stable lowercase label, as serialized into transcripts.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Internal => "internal",
        }
    }
}

/// A skill failure: a typed kind plus a human/model-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}: {}", .kind.as_str(), .message)]
pub struct SkillError {
    pub kind: ErrorKind,
    pub message: String,
}

impl SkillError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}
