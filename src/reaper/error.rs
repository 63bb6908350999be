//! Errors reported by managed resources.

use thiserror::Error;

/// Message fragment the upstream client produces when a rate-limit response
/// arrives as an HTML page instead of JSON.
pub const RATE_LIMIT_SIGNATURE: &str = "rate limit unmarshal error";

/// Failure of an external call made on behalf of a resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The upstream service rate-limited the request.
    #[error("rate limit unmarshal error: {0}")]
    RateLimited(String),
    /// The service refused the request for lack of permission.
    #[error("missing permissions: {0}")]
    Unauthorized(String),
    /// The upstream service answered with an error status.
    #[error("upstream returned {status}: {message}")]
    Upstream {
        /// HTTP-style status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },
    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResourceError {
    /// Whether a failed backlog load should be retried with backoff.
    ///
    /// Only rate limiting qualifies, whether typed as such or recognized by
    /// its message.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited(_) => true,
            other => other.to_string().contains(RATE_LIMIT_SIGNATURE),
        }
    }
}
