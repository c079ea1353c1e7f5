//! Graceful Shutdown Handler
//!
//! Handles OS signals and closes the lifecycle.

use super::Lifecycle;
use std::sync::Arc;
use tokio::signal;

/// Handles graceful shutdown of the application
///
/// ShutdownHandler listens for OS signals (SIGTERM, SIGINT) and closes the
/// lifecycle, which runs every `before_close` callback newest first.
///
/// # Example
///
/// ```rust,ignore
/// use stagehand::lifecycle::ShutdownHandler;
///
/// let shutdown_handler = ShutdownHandler::new(Arc::clone(app.lifecycle()));
///
/// // Spawn shutdown handler
/// tokio::spawn(async move {
///     shutdown_handler.wait_for_shutdown().await;
///     std::process::exit(0);
/// });
/// ```
pub struct ShutdownHandler<A> {
    lifecycle: Arc<Lifecycle<A>>,
}

impl<A: 'static> ShutdownHandler<A> {
    /// Create a new ShutdownHandler
    pub fn new(lifecycle: Arc<Lifecycle<A>>) -> Self {
        Self { lifecycle }
    }

    /// Wait for a shutdown signal and perform graceful shutdown
    pub async fn wait_for_shutdown(&self) {
        shutdown_signal().await;
        self.shutdown().await;
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) {
        tracing::info!("Starting graceful shutdown...");
        self.lifecycle.close().await;
        tracing::info!("Graceful shutdown complete");
    }
}

/// Create a future that completes when a shutdown signal is received
///
/// If a signal handler cannot be installed that source is ignored and the
/// other one is still awaited.
///
/// # Example
///
/// ```rust,ignore
/// use stagehand::lifecycle::shutdown_signal;
///
/// tokio::select! {
///     _ = shutdown_signal() => {
///         println!("Shutdown signal received");
///     }
///     _ = server.serve() => {}
/// }
/// ```
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}
