//! Lifecycle Hooks Module
//!
//! Coordinates the staged boot and ordered shutdown of an application
//! assembled from many independently loaded units.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Boot hooks registered (one per load unit)
//!    ↓
//! 2. init: hooks constructed with the application
//!    ↓
//! 3. configWillLoad (each hook, sync)       ← Lifecycle Hook
//!    ↓
//! 4. configDidLoad (each hook, sync)        ← Lifecycle Hook
//!    ↓
//! 5. didLoad (async, load barrier)          ← Lifecycle Hook
//!    ↓
//! 6. willReady (async, boot barrier)        ← Lifecycle Hook
//!    ↓
//! 7. ready (success or first error)
//!    ↓
//! 8. didReady (each hook, sequential)       ← Lifecycle Hook
//!    ↓
//! 9. Server Start → serverDidReady          ← Lifecycle Hook
//!    ↓
//! [Running...]
//!    ↓
//! 10. Shutdown Signal (SIGTERM/SIGINT)
//!    ↓
//! 11. beforeClose (reverse load order)      ← Lifecycle Hook
//!    ↓
//! 12. close event
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use stagehand::lifecycle::{BootHook, HookPhase, LifecycleError};
//! use async_trait::async_trait;
//!
//! pub struct DatabaseBoot {
//!     pool: Arc<Pool>,
//! }
//!
//! #[async_trait]
//! impl BootHook for DatabaseBoot {
//!     fn phases(&self) -> &[HookPhase] {
//!         &[HookPhase::DidLoad, HookPhase::BeforeClose]
//!     }
//!
//!     async fn did_load(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Initializing database connection");
//!         Ok(())
//!     }
//!
//!     async fn before_close(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Closing database connections");
//!         Ok(())
//!     }
//! }
//! ```

mod application;
mod error;
mod manager;
mod registry;
mod shutdown;
mod teardown;
mod traits;

pub use application::{Application, ApplicationBuilder};
pub use error::{LifecycleError, Result};
pub use manager::{Lifecycle, LifecyclePhase};
pub use registry::{Boot, BootHookRegistry, HookConstructor, HookDefinition, HookFn};
pub use shutdown::{ShutdownHandler, shutdown_signal};
pub use teardown::{Teardown, TeardownId};
pub use traits::{BootHook, HookFuture, HookPhase};
