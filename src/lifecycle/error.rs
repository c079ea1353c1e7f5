//! Lifecycle-specific error types

use thiserror::Error;

/// Errors produced by boot hooks and carried by readiness and error events
///
/// The type is `Clone` because one failure is delivered to several
/// consumers: every readiness waiter, the `error` event and each
/// `did_ready` hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Startup work failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Shutdown operation failed
    #[error("Shutdown failed: {0}")]
    ShutdownFailed(String),

    /// Hook execution failed
    #[error("Hook execution failed for {hook}: {message}")]
    HookFailed {
        /// Name of the hook (usually `<path>:<phase>`)
        hook: String,
        /// Error message
        message: String,
    },

    /// Any other error raised inside a hook
    #[error("{0}")]
    Other(String),
}

impl LifecycleError {
    /// Create an initialization failure error
    pub fn init_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    /// Create a shutdown failure error
    pub fn shutdown_failed(msg: impl Into<String>) -> Self {
        Self::ShutdownFailed(msg.into())
    }

    /// Create a hook failure error
    pub fn hook_failed(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HookFailed {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for LifecycleError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

/// A specialized Result type for lifecycle operations
pub type Result<T> = std::result::Result<T, LifecycleError>;
