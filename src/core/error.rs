//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// An OS thread backing the scheduler could not be started.
    #[error("failed to spawn {role} thread: {source}")]
    Spawn {
        /// Which thread failed (dispatcher, timer, worker).
        role: &'static str,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// The scheduler has been shut down and no longer accepts work.
    #[error("scheduler has been shut down")]
    Shutdown,
}

impl SchedulerError {
    pub(crate) const fn spawn(role: &'static str, source: std::io::Error) -> Self {
        Self::Spawn { role, source }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
