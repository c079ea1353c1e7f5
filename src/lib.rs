//! # Stagehand
//!
//! Staged boot, readiness coordination and ordered teardown for applications
//! assembled from many independently loaded units (framework, plugins,
//! application code).
//!
//! ## Features
//!
//! - **Readiness Barrier**: counting gate over dynamically registered async
//!   tasks, with diagnostic timeouts and first-error-wins semantics
//! - **Boot Hooks**: per-unit lifecycle callbacks (`config_will_load` through
//!   `before_close`), declared through a single trait
//! - **Lifecycle Controller**: drives hooks through load, ready and close in
//!   a fixed order, isolating post-ready failures per hook
//! - **Teardown**: close callbacks run newest first, at most once each
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stagehand::prelude::*;
//!
//! struct RedisBoot;
//!
//! #[async_trait]
//! impl BootHook for RedisBoot {
//!     fn phases(&self) -> &[HookPhase] {
//!         &[HookPhase::DidLoad, HookPhase::BeforeClose]
//!     }
//!
//!     async fn did_load(&self) -> Result<(), LifecycleError> {
//!         // connect...
//!         Ok(())
//!     }
//!
//!     async fn before_close(&self) -> Result<(), LifecycleError> {
//!         // disconnect...
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Application::builder()
//!         .boot_hook("plugins/redis/app.rs", |_app: &Application| RedisBoot)
//!         .start()
//!         .await
//!         .expect("application failed to start");
//!
//!     // Serve...
//!     app.server_did_ready();
//!
//!     app.close().await;
//! }
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod loader;
pub mod ready;
pub mod timing;

// Re-export core types
pub use config::{ConfigService, LifecycleOptions};
pub use error::{Result, StagehandError};
pub use event::{EventBus, LifecycleEvent, ReadyStat};
pub use lifecycle::{Application, ApplicationBuilder, BootHook, HookPhase, Lifecycle, LifecycleError};
pub use ready::{Ready, ReadyOptions, ReadySignal, TaskDone, TaskOptions};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use stagehand::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, LifecycleOptions};
    pub use crate::error::StagehandError;
    pub use crate::event::{LifecycleEvent, ReadyStat};
    pub use crate::lifecycle::{
        Application, ApplicationBuilder, BootHook, HookDefinition, HookPhase, Lifecycle,
        LifecycleError, LifecyclePhase, ShutdownHandler, shutdown_signal,
    };
    pub use crate::loader::{BootHookLoader, HookExport, LoadUnit};
    pub use crate::ready::{Ready, ReadyOptions, TaskDone, TaskOptions};
    pub use crate::timing::Timing;
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}
