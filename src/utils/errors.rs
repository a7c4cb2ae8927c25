//! Error types shared by the widget services
//!
//! Every variant here is recovered inside the widget: provider failures fall
//! through to the next provider and then to synthesis, render failures fall
//! through to the next tier and then to the vector renderer.

use thiserror::Error;

/// Failure of a single upstream request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Non-success HTTP status
    #[error("HTTP Error ({0}): {1}")]
    HttpError(u16, String),

    /// 429 Too Many Requests
    #[error("Rate Limited ({0})")]
    RateLimited(String),

    /// Network/request error
    #[error("Request Error: {0}")]
    RequestError(String),

    /// Body did not match the expected shape
    #[error("Deserialization Error: {0}")]
    DeserializationError(String),

    /// Well-formed body without any price samples
    #[error("Empty price series")]
    EmptySeries,

    #[error("Timed out after {0} ms")]
    Timeout(u64),
}

/// Every provider failed for a logical request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("all {} providers failed: {}", .0.len(), describe_attempts(.0))]
    Exhausted(Vec<(String, ApiError)>),

    #[error("no providers configured")]
    NoProviders,
}

fn describe_attempts(attempts: &[(String, ApiError)]) -> String {
    attempts
        .iter()
        .map(|(provider, err)| format!("{}: {}", provider, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Chart backend failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The host environment lacks this capability tier
    #[error("{0} tier unavailable: {1}")]
    Unavailable(&'static str, String),

    /// Drawing failed at runtime
    #[error("{0} tier failed to draw: {1}")]
    Draw(&'static str, String),

    #[error("handle already disposed")]
    Disposed,

    #[error("no capable render tier")]
    NoCapableTier,
}

/// Invalid environment configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_lists_every_attempt() {
        let err = FetchError::Exhausted(vec![
            ("direct".to_string(), ApiError::HttpError(500, "boom".to_string())),
            ("relay".to_string(), ApiError::EmptySeries),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("all 2 providers failed"));
        assert!(msg.contains("direct: HTTP Error (500): boom"));
        assert!(msg.contains("relay: Empty price series"));
    }
}
