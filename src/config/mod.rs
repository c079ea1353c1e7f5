use crate::error::{Result, StagehandError};
use dashmap::DashMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Environment key holding the readiness timeout in milliseconds.
pub const READY_TIMEOUT_ENV: &str = "STAGEHAND_READY_TIMEOUT";

/// Readiness timeout used when nothing is configured.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment
    pub fn from_env() -> Self {
        let service = Self::default();
        for (key, value) in env::vars() {
            service.set(&key, &value);
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }
}

/// Settings read once when a [`Lifecycle`](crate::lifecycle::Lifecycle) is built
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// How long a readiness task may stay pending before `ready_timeout` fires
    pub ready_timeout: Duration,
    /// Prefix stripped from hook paths in timing labels
    pub base_dir: Option<PathBuf>,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            ready_timeout: DEFAULT_READY_TIMEOUT,
            base_dir: None,
        }
    }
}

impl LifecycleOptions {
    /// Build options from a config snapshot.
    ///
    /// A missing `STAGEHAND_READY_TIMEOUT` falls back to the default; a value
    /// that is not a non-negative integer is rejected.
    pub fn from_config(config: &ConfigService) -> Result<Self> {
        let ready_timeout = match config.get(READY_TIMEOUT_ENV) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_READY_TIMEOUT,
        };
        Ok(Self {
            ready_timeout,
            base_dir: None,
        })
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// Path relative to `base_dir` when it lives underneath it.
    pub fn resolve_filename(&self, path: &str) -> String {
        self.base_dir
            .as_deref()
            .and_then(|base| std::path::Path::new(path).strip_prefix(base).ok())
            .map(|rel| rel.display().to_string())
            .unwrap_or_else(|| path.to_string())
    }
}

fn parse_timeout(raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| StagehandError::InvalidReadyTimeout {
            key: READY_TIMEOUT_ENV.to_string(),
            value: raw.to_string(),
        })
}
