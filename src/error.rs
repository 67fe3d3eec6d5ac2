//! Terminal turn failures, classified for the caller.
//!
//! When provider retries exhaust, the raw [`ProviderError`] is folded
//! into this small user-facing taxonomy — callers render a message per
//! category instead of leaking provider internals. Skill failures
//! never appear here; they are folded into the transcript.

use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider overloaded: {0}")]
    Overloaded(String),

    #[error("provider failure: {0}")]
    Unknown(String),
}

impl From<ProviderError> for DispatchError {
    fn from(e: ProviderError) -> Self {
        match &e {
            ProviderError::RateLimited(_) => DispatchError::RateLimited(e.to_string()),
            ProviderError::Overloaded(_) => DispatchError::Overloaded(e.to_string()),
            ProviderError::Unavailable(_)
            | ProviderError::Network(_)
            | ProviderError::Timeout(_) => DispatchError::Unavailable(e.to_string()),
            ProviderError::InvalidRequest(_) | ProviderError::Other(_) => {
                DispatchError::Unknown(e.to_string())
            }
        }
    }
}
