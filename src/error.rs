use crate::lifecycle::LifecycleError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StagehandError>;

/// Configuration and registration-discipline failures.
///
/// These indicate programmer error (hooks added too late, double init,
/// teardown registered after close) or a broken deployment setting, and
/// are meant to stop startup rather than be recovered from.
#[derive(Debug, Error)]
pub enum StagehandError {
    #[error("{key}={value} should be a non-negative integer of milliseconds")]
    InvalidReadyTimeout { key: String, value: String },

    #[error("do not add hook when lifecycle has been initialized")]
    HookAfterInit,

    #[error("lifecycle has already been initialized")]
    AlreadyInitialized,

    #[error("lifecycle has not been initialized")]
    NotInitialized,

    #[error("application has been closed")]
    Closed,

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
