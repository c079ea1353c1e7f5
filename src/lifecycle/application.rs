//! Application Bootstrap
//!
//! Provides a high-level API for booting an application from its load
//! units with integrated lifecycle management.

use super::{BootHook, Lifecycle, LifecycleError, ShutdownHandler, TeardownId};
use crate::config::{ConfigService, LifecycleOptions};
use crate::error::Result;
use crate::loader::{BootHookLoader, LoadUnit};
use crate::timing::Timing;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

struct AppInner {
    name: String,
    config: ConfigService,
    lifecycle: Arc<Lifecycle<Application>>,
}

/// Host handle every boot hook is constructed with
///
/// Cheap to clone; all clones share one lifecycle.
///
/// # Example
///
/// ```rust,ignore
/// use stagehand::lifecycle::Application;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let app = Application::builder()
///         .name("shop")
///         .boot_hook("plugins/redis/app.rs", RedisBoot::new)
///         .function_hook("app/app.rs", |app| { routes(app); Ok(()) })
///         .start()
///         .await?;
///
///     // Start server...
///     app.server_did_ready();
///
///     app.shutdown_handler().wait_for_shutdown().await;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Application {
    inner: Arc<AppInner>,
}

impl Application {
    /// Create a new application builder
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &ConfigService {
        &self.inner.config
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle<Application>> {
        &self.inner.lifecycle
    }

    pub fn timing(&self) -> &Timing {
        self.inner.lifecycle.timing()
    }

    /// Wait until startup finished; `Err` carries the first boot failure.
    pub async fn ready(&self) -> std::result::Result<(), LifecycleError> {
        self.inner.lifecycle.wait_ready().await
    }

    /// Call once the server is accepting connections.
    pub fn server_did_ready(&self) {
        self.inner.lifecycle.trigger_server_did_ready();
    }

    pub fn register_before_close<F, Fut>(&self, name: impl Into<String>, callback: F) -> Result<TeardownId>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), LifecycleError>> + Send + 'static,
    {
        self.inner.lifecycle.register_before_close(name, callback)
    }

    /// Run teardown and emit `close`.
    pub async fn close(&self) {
        tracing::info!("Shutting down application {}...", self.inner.name);
        self.inner.lifecycle.close().await;
        tracing::info!("Application shutdown complete");
    }

    /// Create a shutdown handler for graceful shutdown
    pub fn shutdown_handler(&self) -> ShutdownHandler<Application> {
        ShutdownHandler::new(Arc::clone(&self.inner.lifecycle))
    }

    /// Spawn a background task that waits for shutdown signals
    /// and closes the application automatically.
    pub fn spawn_shutdown_handler(&self) -> tokio::task::JoinHandle<()> {
        let shutdown_handler = self.shutdown_handler();
        tokio::spawn(async move {
            shutdown_handler.wait_for_shutdown().await;
        })
    }
}

/// Builder for Application
pub struct ApplicationBuilder {
    name: String,
    config: Option<ConfigService>,
    ready_timeout: Option<Duration>,
    base_dir: Option<PathBuf>,
    units: Vec<LoadUnit<Application>>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self {
            name: "app".to_string(),
            config: None,
            ready_timeout: None,
            base_dir: None,
            units: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Use this config instead of a snapshot of the process environment
    pub fn config(mut self, config: ConfigService) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the configured readiness timeout
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    pub fn load_unit(mut self, unit: LoadUnit<Application>) -> Self {
        self.units.push(unit);
        self
    }

    pub fn boot_hook<H, F>(self, path: impl Into<String>, construct: F) -> Self
    where
        H: BootHook,
        F: Fn(&Application) -> H + Send + Sync + 'static,
    {
        self.load_unit(LoadUnit::structured(path, construct))
    }

    pub fn function_hook<F>(self, path: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&Application) -> std::result::Result<(), LifecycleError> + Send + Sync + 'static,
    {
        self.load_unit(LoadUnit::function(path, hook))
    }

    /// Build the application and start its boot sequence without waiting
    /// for it. Must be called inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Invalid readiness timeout, or a failing config hook.
    pub fn build(self) -> Result<Application> {
        let config = self.config.unwrap_or_else(ConfigService::from_env);
        let mut options = LifecycleOptions::from_config(&config)?;
        if let Some(timeout) = self.ready_timeout {
            options = options.with_ready_timeout(timeout);
        }
        if let Some(base_dir) = self.base_dir {
            options = options.with_base_dir(base_dir);
        }

        tracing::info!("Starting application {}...", self.name);
        let app = Application {
            inner: Arc::new(AppInner {
                name: self.name,
                config,
                lifecycle: Lifecycle::new(options),
            }),
        };
        BootHookLoader::new(&app.inner.lifecycle, "app").load_custom(&app, self.units)?;
        Ok(app)
    }

    /// Build the application and wait until it is ready.
    ///
    /// # Errors
    ///
    /// Everything [`build`](Self::build) reports, plus the first failing
    /// `did_load`/`will_ready` hook.
    pub async fn start(self) -> Result<Application> {
        let app = self.build()?;
        app.ready().await?;
        tracing::info!("Application initialization complete");
        Ok(app)
    }
}
