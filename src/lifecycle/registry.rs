//! Boot hook definitions and their live instances.

use super::{BootHook, HookPhase, Result};
use crate::error::StagehandError;
use std::sync::{Arc, Mutex, PoisonError};

/// Builds a hook instance from the running application
pub type HookConstructor<A> = Arc<dyn Fn(&A) -> Arc<dyn BootHook> + Send + Sync>;

/// Plain function hook: runs once, when configuration is final
pub type HookFn<A> = Arc<dyn Fn(&A) -> Result<()> + Send + Sync>;

/// A registered but not yet instantiated hook
pub struct HookDefinition<A> {
    path: String,
    construct: HookConstructor<A>,
}

impl<A: 'static> HookDefinition<A> {
    pub fn new<H, F>(path: impl Into<String>, construct: F) -> Self
    where
        H: BootHook,
        F: Fn(&A) -> H + Send + Sync + 'static,
    {
        Self::from_constructor(
            path,
            Arc::new(move |app: &A| Arc::new(construct(app)) as Arc<dyn BootHook>),
        )
    }

    pub fn from_constructor(path: impl Into<String>, construct: HookConstructor<A>) -> Self {
        Self {
            path: path.into(),
            construct,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn instantiate(&self, app: &A) -> Boot {
        Boot {
            path: self.path.clone(),
            hook: (self.construct)(app),
        }
    }
}

impl<A: Clone + Send + Sync + 'static> HookDefinition<A> {
    /// Adapt a plain function into a hook whose only callback is
    /// `config_did_load`.
    pub fn function(path: impl Into<String>, hook: HookFn<A>) -> Self {
        Self::from_constructor(
            path,
            Arc::new(move |app: &A| {
                Arc::new(FunctionHook {
                    app: Mutex::new(Some(app.clone())),
                    hook: Arc::clone(&hook),
                }) as Arc<dyn BootHook>
            }),
        )
    }
}

/// Holds the application only until its single call.
struct FunctionHook<A> {
    app: Mutex<Option<A>>,
    hook: HookFn<A>,
}

impl<A: Send + Sync + 'static> BootHook for FunctionHook<A> {
    fn phases(&self) -> &[HookPhase] {
        &[HookPhase::ConfigDidLoad]
    }

    fn config_did_load(&self) -> Result<()> {
        let app = self.app.lock().unwrap_or_else(PoisonError::into_inner).take();
        match app {
            Some(app) => (self.hook)(&app),
            None => Ok(()),
        }
    }
}

/// A live hook bound to the application
#[derive(Clone)]
pub struct Boot {
    path: String,
    hook: Arc<dyn BootHook>,
}

impl Boot {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn implements(&self, phase: HookPhase) -> bool {
        self.hook.phases().contains(&phase)
    }

    /// Diagnostic task name, e.g. `plugins/redis/app.rs:didLoad`
    pub fn full_name(&self, phase: HookPhase) -> String {
        format!("{}:{}", self.path, phase)
    }

    pub fn hook(&self) -> &Arc<dyn BootHook> {
        &self.hook
    }
}

impl std::fmt::Debug for Boot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Boot")
            .field("path", &self.path)
            .field("phases", &self.hook.phases())
            .finish()
    }
}

/// Ordered hook definitions, frozen into [`Boot`] instances by `init`
pub struct BootHookRegistry<A> {
    definitions: Vec<HookDefinition<A>>,
    boots: Option<Arc<[Boot]>>,
}

impl<A> Default for BootHookRegistry<A> {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            boots: None,
        }
    }
}

impl<A: 'static> BootHookRegistry<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, definition: HookDefinition<A>) -> crate::Result<()> {
        if self.is_initialized() {
            return Err(StagehandError::HookAfterInit);
        }
        tracing::debug!("add boot hook {}", definition.path());
        self.definitions.push(definition);
        Ok(())
    }

    /// Instantiate every definition, in registration order, exactly once.
    pub fn init(&mut self, app: &A) -> crate::Result<Arc<[Boot]>> {
        if self.is_initialized() {
            return Err(StagehandError::AlreadyInitialized);
        }
        let boots: Arc<[Boot]> = self
            .definitions
            .iter()
            .map(|definition| definition.instantiate(app))
            .collect();
        self.boots = Some(Arc::clone(&boots));
        Ok(boots)
    }

    pub fn is_initialized(&self) -> bool {
        self.boots.is_some()
    }

    /// Drop the live instances; the registry stays initialized.
    pub fn release(&mut self) {
        if self.boots.is_some() {
            self.boots = Some(Arc::from(Vec::new()));
        }
    }

    /// Live instances; empty before `init`
    pub fn boots(&self) -> Arc<[Boot]> {
        self.boots.clone().unwrap_or_else(|| Arc::from(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
