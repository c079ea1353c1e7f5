//! Boot hook loading
//!
//! Turns ordered load units (framework, plugins, application) into boot
//! hooks on a [`Lifecycle`]. How units are discovered is up to the caller;
//! this only consumes `(path, export)` pairs.

use crate::error::Result;
use crate::lifecycle::{BootHook, HookConstructor, HookDefinition, HookFn, Lifecycle, LifecycleError};
use std::sync::Arc;

/// What a load unit exports as its boot hook
pub enum HookExport<A> {
    /// A hook built from the application, with any set of callbacks
    Structured(HookConstructor<A>),
    /// A plain function, run when configuration is final
    Function(HookFn<A>),
    /// Something that is neither; carries a description for the warning
    Invalid(String),
}

/// One unit's boot file
pub struct LoadUnit<A> {
    pub path: String,
    pub export: Option<HookExport<A>>,
}

impl<A: 'static> LoadUnit<A> {
    pub fn structured<H, F>(path: impl Into<String>, construct: F) -> Self
    where
        H: BootHook,
        F: Fn(&A) -> H + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            export: Some(HookExport::Structured(Arc::new(move |app: &A| {
                Arc::new(construct(app)) as Arc<dyn BootHook>
            }))),
        }
    }

    pub fn function<F>(path: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&A) -> std::result::Result<(), LifecycleError> + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            export: Some(HookExport::Function(Arc::new(hook))),
        }
    }

    /// A unit without a boot file
    pub fn empty(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            export: None,
        }
    }

    pub fn invalid(path: impl Into<String>, found: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            export: Some(HookExport::Invalid(found.into())),
        }
    }
}

/// Registers load units' hooks on a lifecycle and initializes it
pub struct BootHookLoader<'a, A> {
    lifecycle: &'a Lifecycle<A>,
    file_name: &'a str,
}

impl<'a, A: Clone + Send + Sync + 'static> BootHookLoader<'a, A> {
    /// `file_name` labels the timing record, e.g. `"app"`.
    pub fn new(lifecycle: &'a Lifecycle<A>, file_name: &'a str) -> Self {
        Self {
            lifecycle,
            file_name,
        }
    }

    /// Add every unit's hook in order, then freeze the lifecycle with `app`.
    /// Returns how many hooks were registered.
    pub fn load_boot_hooks<I>(&self, app: &A, units: I) -> Result<usize>
    where
        I: IntoIterator<Item = LoadUnit<A>>,
    {
        let timing_key = format!("Load {}.rs", self.file_name);
        let timing = self.lifecycle.timing();
        timing.start(timing_key.clone());

        let mut added = 0;
        for unit in units {
            let Some(export) = unit.export else {
                continue;
            };
            match export {
                HookExport::Structured(construct) => {
                    tracing::debug!("add boot hook (structured) {}", unit.path);
                    self.lifecycle
                        .add_boot_hook(HookDefinition::from_constructor(unit.path, construct))?;
                }
                HookExport::Function(hook) => {
                    tracing::debug!("add boot hook (function) {}", unit.path);
                    self.lifecycle
                        .add_boot_hook(HookDefinition::function(unit.path, hook))?;
                }
                HookExport::Invalid(found) => {
                    tracing::warn!(
                        "[stagehand:loader] {} must export a boot hook, found {}",
                        unit.path,
                        found
                    );
                    continue;
                }
            }
            added += 1;
        }

        self.lifecycle.init(app)?;
        timing.end(&timing_key);
        Ok(added)
    }

    /// Load hooks and kick off the boot sequence from `config_will_load`.
    pub fn load_custom<I>(&self, app: &A, units: I) -> Result<usize>
    where
        I: IntoIterator<Item = LoadUnit<A>>,
    {
        let added = self.load_boot_hooks(app, units)?;
        self.lifecycle.trigger_config_will_load()?;
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleOptions;
    use crate::lifecycle::HookPhase;
    use std::sync::Mutex;

    type Seen = Arc<Mutex<Vec<String>>>;

    struct PluginBoot {
        seen: Seen,
    }

    impl BootHook for PluginBoot {
        fn phases(&self) -> &[HookPhase] {
            &[HookPhase::ConfigDidLoad]
        }

        fn config_did_load(&self) -> std::result::Result<(), LifecycleError> {
            self.seen.lock().unwrap().push("plugin".into());
            Ok(())
        }
    }

    #[tokio::test]
    async fn loads_units_in_order_and_skips_bad_exports() {
        let seen = Seen::default();
        let lifecycle = Lifecycle::<Seen>::new(LifecycleOptions::default());
        let units = vec![
            LoadUnit::structured("plugins/a/app.rs", |seen: &Seen| PluginBoot {
                seen: Arc::clone(seen),
            }),
            LoadUnit::empty("plugins/b"),
            LoadUnit::invalid("plugins/c/app.rs", "a number"),
            LoadUnit::function("app/app.rs", |seen: &Seen| {
                seen.lock().unwrap().push("app".into());
                Ok(())
            }),
        ];

        let added = BootHookLoader::new(&lifecycle, "app")
            .load_custom(&seen, units)
            .unwrap();

        assert_eq!(added, 2);
        let paths: Vec<String> = lifecycle.boots().iter().map(|b| b.path().to_string()).collect();
        assert_eq!(paths, vec!["plugins/a/app.rs", "app/app.rs"]);
        assert_eq!(*seen.lock().unwrap(), vec!["plugin", "app"]);
        assert!(lifecycle.timing().get("Load app.rs").unwrap().end.is_some());
        lifecycle.wait_ready().await.unwrap();
    }
}
