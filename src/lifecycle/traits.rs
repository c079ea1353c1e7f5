//! Boot hook contract
//!
//! A boot hook is the lifecycle-bound part of one loaded unit (framework,
//! plugin or application). It is constructed once per application and takes
//! part in the phases it declares through [`BootHook::phases`].

use super::{LifecycleError, Result};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use strum::EnumMessage;
use strum_macros::{AsRefStr, Display, EnumMessage as DeriveEnumMessage};

/// Boxed future returned by asynchronous lifecycle callbacks
pub type HookFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// The callbacks a boot hook may implement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, DeriveEnumMessage)]
pub enum HookPhase {
    #[strum(serialize = "configWillLoad", message = "Config Will Load")]
    ConfigWillLoad,
    #[strum(serialize = "configDidLoad", message = "Config Did Load")]
    ConfigDidLoad,
    #[strum(serialize = "didLoad", message = "Did Load")]
    DidLoad,
    #[strum(serialize = "willReady", message = "Will Ready")]
    WillReady,
    #[strum(serialize = "didReady", message = "Did Ready")]
    DidReady,
    #[strum(serialize = "serverDidReady", message = "Server Did Ready")]
    ServerDidReady,
    #[strum(serialize = "beforeClose", message = "Before Close")]
    BeforeClose,
}

impl HookPhase {
    /// Human readable title used in timing labels ("Did Load")
    pub fn title(&self) -> &'static str {
        self.get_message().unwrap_or("Hook")
    }
}

/// Lifecycle callbacks of one loaded unit
///
/// Every callback has a no-op default. The lifecycle only invokes the ones
/// listed by [`phases`](Self::phases), so a hook that does not list
/// `DidLoad` never holds the load barrier open and a hook that does not list
/// `BeforeClose` never lands in the teardown set.
///
/// # Example
///
/// ```rust,ignore
/// use stagehand::lifecycle::{BootHook, HookPhase, LifecycleError};
/// use async_trait::async_trait;
///
/// struct RedisBoot {
///     client: Arc<RedisClient>,
/// }
///
/// #[async_trait]
/// impl BootHook for RedisBoot {
///     fn phases(&self) -> &[HookPhase] {
///         &[HookPhase::DidLoad, HookPhase::BeforeClose]
///     }
///
///     async fn did_load(&self) -> Result<(), LifecycleError> {
///         self.client.connect().await
///             .map_err(|e| LifecycleError::init_failed(e.to_string()))
///     }
///
///     async fn before_close(&self) -> Result<(), LifecycleError> {
///         self.client.quit().await;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait BootHook: Send + Sync + 'static {
    /// Phases this hook takes part in
    fn phases(&self) -> &[HookPhase];

    /// Called before configuration is finalized; still free to change it
    fn config_will_load(&self) -> Result<()> {
        Ok(())
    }

    /// Called once configuration is final
    fn config_did_load(&self) -> Result<()> {
        Ok(())
    }

    /// Asynchronous load-phase work; startup fails if it errors
    async fn did_load(&self) -> Result<()> {
        Ok(())
    }

    /// Asynchronous work right before the application is declared ready;
    /// startup fails if it errors
    async fn will_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Called once readiness resolves, with the startup error if any
    async fn did_ready(&self, _err: Option<LifecycleError>) -> Result<()> {
        Ok(())
    }

    /// Called once the host is accepting connections
    async fn server_did_ready(&self) -> Result<()> {
        Ok(())
    }

    /// Called during close, in reverse registration order
    async fn before_close(&self) -> Result<()> {
        Ok(())
    }
}

/// Run `work` on its own task so a panicking hook turns into an error for
/// `hook` instead of tearing down the caller.
pub(crate) async fn run_guarded<F>(hook: &str, work: F) -> Result<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(join_err) => Err(LifecycleError::hook_failed(hook, join_err.to_string())),
    }
}
