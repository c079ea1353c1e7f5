//! Lifecycle Controller
//!
//! Drives boot hooks through the staged boot sequence and owns the two
//! readiness barriers (load phase and boot phase) plus the teardown set.

use super::registry::{Boot, BootHookRegistry, HookDefinition, HookFn};
use super::teardown::{Teardown, TeardownId};
use super::traits::run_guarded;
use super::{BootHook, HookPhase, LifecycleError};
use crate::config::LifecycleOptions;
use crate::error::{Result, StagehandError};
use crate::event::{EventBus, LifecycleEvent};
use crate::ready::{Ready, ReadyOptions, ReadySignal, TaskDone, TaskOptions};
use crate::timing::Timing;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use strum_macros::Display;
use tokio::sync::{broadcast, watch};
use tokio::task::{JoinHandle, JoinSet};

const APPLICATION_START: &str = "Application Start";

/// Where the controller is in the boot sequence. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum LifecyclePhase {
    Uninitialized,
    Initialized,
    ConfigWillLoad,
    ConfigDidLoad,
    DidLoadRegistered,
    WillReadyRegistered,
    DidReady,
    ServerDidReady,
    Closed,
}

/// Boot/ready/close orchestration for one application instance
///
/// `A` is the application handle every hook is constructed with.
///
/// ```text
/// add_boot_hook* → init → trigger_config_will_load
///     → config_will_load (sync, in order)
///     → config_did_load  (sync, in order; before_close hooks registered)
///     → did_load tasks   (load barrier)
///     → will_ready tasks (boot barrier)
///     → ready            (one-shot, success or first error)
///     → did_ready        (sequential, errors isolated)
/// trigger_server_did_ready → server_did_ready (errors isolated)
/// close → before_close callbacks, newest first → `close` event
/// ```
///
/// # Example
///
/// ```rust,ignore
/// let lifecycle = Lifecycle::new(LifecycleOptions::default());
/// lifecycle.add_hook("plugins/redis/app.rs", |app: &App| RedisBoot::new(app))?;
/// lifecycle.init(&app)?;
/// lifecycle.trigger_config_will_load()?;
/// lifecycle.wait_ready().await?;
/// ```
pub struct Lifecycle<A> {
    this: Weak<Self>,
    options: LifecycleOptions,
    registry: Mutex<BootHookRegistry<A>>,
    teardown: Teardown,
    closing: AtomicBool,
    closed: watch::Sender<bool>,
    phase: Mutex<LifecyclePhase>,
    load_ready: Ready,
    boot_ready: Ready,
    ready: ReadySignal,
    events: EventBus,
    timing: Timing,
}

impl<A: 'static> Lifecycle<A> {
    pub fn new(options: LifecycleOptions) -> Arc<Self> {
        Self::with_timing(options, Timing::new())
    }

    /// Create a controller that records into an existing [`Timing`].
    pub fn with_timing(options: LifecycleOptions, timing: Timing) -> Arc<Self> {
        timing.start(APPLICATION_START);
        let events = EventBus::new();
        let barrier = ReadyOptions::lazy(options.ready_timeout);

        let lifecycle = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            load_ready: Ready::with_events(barrier.clone(), events.clone()),
            boot_ready: Ready::with_events(barrier, events.clone()),
            options,
            registry: Mutex::new(BootHookRegistry::new()),
            teardown: Teardown::new(),
            closing: AtomicBool::new(false),
            closed: watch::channel(false).0,
            phase: Mutex::new(LifecyclePhase::Uninitialized),
            ready: ReadySignal::new(),
            events,
            timing,
        });
        lifecycle.init_ready();
        lifecycle
    }

    pub fn add_boot_hook(&self, definition: HookDefinition<A>) -> Result<()> {
        lock(&self.registry).add(definition)
    }

    /// Register a structured hook built from the application by `construct`.
    pub fn add_hook<H, F>(&self, path: impl Into<String>, construct: F) -> Result<()>
    where
        H: BootHook,
        F: Fn(&A) -> H + Send + Sync + 'static,
    {
        self.add_boot_hook(HookDefinition::new(path, construct))
    }

    /// Freeze the hook list and construct every hook with `app`.
    pub fn init(&self, app: &A) -> Result<()> {
        let boots = lock(&self.registry).init(app)?;
        self.set_phase(LifecyclePhase::Initialized);
        tracing::info!("Lifecycle initialized ({} boot hooks)", boots.len());
        Ok(())
    }

    /// Live hook instances in registration order; empty before `init`
    pub fn boots(&self) -> Arc<[Boot]> {
        lock(&self.registry).boots()
    }

    /// Run `config_will_load` on every hook, then continue into
    /// [`trigger_config_did_load`](Self::trigger_config_did_load).
    pub fn trigger_config_will_load(&self) -> Result<()> {
        let boots = self.initialized_boots()?;
        self.set_phase(LifecyclePhase::ConfigWillLoad);
        for boot in boots.iter().filter(|b| b.implements(HookPhase::ConfigWillLoad)) {
            tracing::debug!("configWillLoad: {}", boot.path());
            boot.hook().config_will_load()?;
        }
        self.trigger_config_did_load()
    }

    /// Run `config_did_load` on every hook, register `before_close`
    /// callbacks in load order, then continue into
    /// [`trigger_did_load`](Self::trigger_did_load).
    pub fn trigger_config_did_load(&self) -> Result<()> {
        let boots = self.initialized_boots()?;
        self.set_phase(LifecyclePhase::ConfigDidLoad);
        for boot in boots.iter() {
            if boot.implements(HookPhase::ConfigDidLoad) {
                tracing::debug!("configDidLoad: {}", boot.path());
                boot.hook().config_did_load()?;
            }
            if boot.implements(HookPhase::BeforeClose) {
                let hook = Arc::clone(boot.hook());
                self.register_before_close(boot.full_name(HookPhase::BeforeClose), move || {
                    async move { hook.before_close().await }
                })?;
            }
        }
        self.trigger_did_load();
        Ok(())
    }

    /// Schedule every `did_load` as a task on the load barrier, then start it.
    /// Does not wait for the work.
    pub fn trigger_did_load(&self) {
        tracing::debug!("register didLoad");
        self.set_phase(LifecyclePhase::DidLoadRegistered);
        for boot in self.boots().iter().filter(|b| b.implements(HookPhase::DidLoad)) {
            let hook = Arc::clone(boot.hook());
            self.spawn_ready_task(&self.load_ready, boot, HookPhase::DidLoad, async move {
                hook.did_load().await
            });
        }
        self.load_ready.start();
    }

    /// Schedule every `will_ready` as a task on the boot barrier, then start
    /// it. With no `will_ready` hooks the barrier settles on the next tick.
    ///
    /// Invoked automatically once the load barrier drains successfully.
    pub fn trigger_will_ready(&self) {
        tracing::debug!("register willReady");
        self.set_phase(LifecyclePhase::WillReadyRegistered);
        for boot in self.boots().iter().filter(|b| b.implements(HookPhase::WillReady)) {
            let hook = Arc::clone(boot.hook());
            self.spawn_ready_task(&self.boot_ready, boot, HookPhase::WillReady, async move {
                hook.will_ready().await
            });
        }
        self.boot_ready.start();
    }

    /// Call `did_ready(err)` on every hook, one after the other. A failing
    /// hook is reported as an `error` event and the rest still run.
    ///
    /// Invoked automatically once readiness resolves.
    pub fn trigger_did_ready(&self, err: Option<LifecycleError>) -> JoinHandle<()> {
        tracing::debug!("trigger didReady");
        let boots = self.boots();
        let events = self.events.clone();
        tokio::spawn(async move {
            for boot in boots.iter().filter(|b| b.implements(HookPhase::DidReady)) {
                let hook = Arc::clone(boot.hook());
                let err = err.clone();
                let name = boot.full_name(HookPhase::DidReady);
                if let Err(e) = run_guarded(&name, async move { hook.did_ready(err).await }).await
                {
                    report_hook_error(&events, &name, e);
                }
            }
            tracing::debug!("trigger didReady done");
        })
    }

    /// Tell every hook the server is accepting connections. Hooks run
    /// independently of each other; failures become `error` events.
    pub fn trigger_server_did_ready(&self) -> JoinHandle<()> {
        if self.phase() >= LifecyclePhase::DidReady {
            self.set_phase(LifecyclePhase::ServerDidReady);
        } else {
            tracing::warn!("serverDidReady triggered before the application is ready");
        }
        let mut hooks = JoinSet::new();
        for boot in self.boots().iter().filter(|b| b.implements(HookPhase::ServerDidReady)) {
            let hook = Arc::clone(boot.hook());
            let name = boot.full_name(HookPhase::ServerDidReady);
            hooks.spawn(async move {
                let result = run_guarded(&name, async move { hook.server_did_ready().await }).await;
                (name, result)
            });
        }
        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(joined) = hooks.join_next().await {
                match joined {
                    Ok((name, Err(e))) => report_hook_error(&events, &name, e),
                    Ok(_) => {}
                    Err(join_err) => tracing::error!("serverDidReady task lost: {}", join_err),
                }
            }
        })
    }

    /// Hold the load phase open until `work` finishes; its error fails
    /// startup.
    pub fn register_before_start<F>(&self, name: impl Into<String>, work: F)
    where
        F: Future<Output = std::result::Result<(), LifecycleError>> + Send + 'static,
    {
        let name = name.into();
        let timing_key = format!("Before Start in {}", self.options.resolve_filename(&name));
        self.spawn_task(&self.load_ready, name, timing_key, work);
    }

    /// Open a pending slot on the load barrier and hand its completion to
    /// the caller.
    pub fn legacy_ready_callback(&self, name: impl Into<String>, options: TaskOptions) -> TaskDone {
        self.load_ready.register_with(name, options)
    }

    /// Add a teardown callback. Fails once closing has started, including
    /// from inside another close callback.
    pub fn register_before_close<F, Fut>(&self, name: impl Into<String>, callback: F) -> Result<TeardownId>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = std::result::Result<(), LifecycleError>> + Send + 'static,
    {
        if self.closing.load(Ordering::Acquire) {
            return Err(StagehandError::Closed);
        }
        Ok(self.teardown.register(name, callback))
    }

    pub fn remove_before_close(&self, id: TeardownId) -> bool {
        self.teardown.remove(id)
    }

    /// Run teardown callbacks newest first, then emit `close` and go silent.
    ///
    /// Only the first call drains; later or overlapping calls wait until
    /// that drain has finished and `close` was emitted. If the first call is
    /// dropped mid-drain, the others keep waiting.
    /// Callback failures become `error` events.
    pub async fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            tracing::debug!("lifecycle already closing");
            let mut closed = self.closed.subscribe();
            let _ = closed.wait_for(|closed| *closed).await;
            return;
        }
        tracing::info!("Closing lifecycle ({} close callbacks)", self.teardown.len());
        let events = self.events.clone();
        self.teardown
            .drain(|name, err| report_hook_error(&events, name, err))
            .await;

        // Be called after other close callbacks
        self.events.publish(LifecycleEvent::Close);
        self.events.detach();
        self.ready.clear_callbacks();
        // Hooks may hold the application handle, which owns this lifecycle.
        lock(&self.registry).release();
        self.set_phase(LifecyclePhase::Closed);
        self.closed.send_replace(true);
        tracing::info!("Lifecycle closed");
    }

    /// Wait for overall readiness; `Err` carries the first startup failure.
    pub async fn wait_ready(&self) -> std::result::Result<(), LifecycleError> {
        self.ready.wait().await
    }

    /// Run `callback` once, when overall readiness resolves.
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(Option<LifecycleError>) + Send + 'static,
    {
        self.ready.on_ready(callback);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_ready()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    pub fn phase(&self) -> LifecyclePhase {
        *lock(&self.phase)
    }

    /// See [`EventBus::subscribe`] for the buffering limit.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn options(&self) -> &LifecycleOptions {
        &self.options
    }

    fn init_ready(&self) {
        let this = self.this.clone();
        self.load_ready.on_ready(move |err| {
            let Some(lifecycle) = this.upgrade() else {
                return;
            };
            tracing::debug!("didLoad done");
            match err {
                Some(err) => lifecycle.resolve_ready(Some(err)),
                None => lifecycle.trigger_will_ready(),
            }
        });

        let this = self.this.clone();
        self.boot_ready.on_ready(move |err| {
            if let Some(lifecycle) = this.upgrade() {
                lifecycle.resolve_ready(err);
            }
        });
    }

    fn resolve_ready(&self, err: Option<LifecycleError>) {
        if !self.ready.resolve(err.clone()) {
            return;
        }
        match &err {
            Some(e) => tracing::error!("Application failed to start: {}", e),
            None => tracing::info!("Application ready"),
        }
        self.set_phase(LifecyclePhase::DidReady);
        self.events.publish(LifecycleEvent::Ready(err.clone()));
        self.trigger_did_ready(err);
        self.timing.end(APPLICATION_START);
    }

    fn spawn_ready_task<F>(&self, ready: &Ready, boot: &Boot, phase: HookPhase, work: F)
    where
        F: Future<Output = std::result::Result<(), LifecycleError>> + Send + 'static,
    {
        let timing_key = format!(
            "{} in {}",
            phase.title(),
            self.options.resolve_filename(boot.path())
        );
        self.spawn_task(ready, boot.full_name(phase), timing_key, work);
    }

    fn spawn_task<F>(&self, ready: &Ready, name: String, timing_key: String, work: F)
    where
        F: Future<Output = std::result::Result<(), LifecycleError>> + Send + 'static,
    {
        self.timing.start(timing_key.clone());
        let done = ready.register(name.clone());
        let timing = self.timing.clone();
        // Never on the caller's stack: registration of the whole phase
        // finishes before any hook body runs.
        tokio::spawn(async move {
            let result = run_guarded(&name, work).await;
            done.complete(result);
            timing.end(&timing_key);
        });
    }

    fn initialized_boots(&self) -> Result<Arc<[Boot]>> {
        let registry = lock(&self.registry);
        if !registry.is_initialized() {
            return Err(StagehandError::NotInitialized);
        }
        Ok(registry.boots())
    }

    fn set_phase(&self, phase: LifecyclePhase) {
        let mut current = lock(&self.phase);
        if phase > *current {
            tracing::debug!("lifecycle phase {} -> {}", *current, phase);
            *current = phase;
        }
    }
}

impl<A: Clone + Send + Sync + 'static> Lifecycle<A> {
    /// Register a plain function hook; it runs during `config_did_load`.
    pub fn add_function_hook<F>(&self, path: impl Into<String>, hook: F) -> Result<()>
    where
        F: Fn(&A) -> std::result::Result<(), LifecycleError> + Send + Sync + 'static,
    {
        let hook: HookFn<A> = Arc::new(hook);
        self.add_boot_hook(HookDefinition::function(path, hook))
    }
}

fn report_hook_error(events: &EventBus, hook: &str, err: LifecycleError) {
    tracing::error!("{} failed: {}", hook, err);
    events.publish(LifecycleEvent::Error(err));
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
