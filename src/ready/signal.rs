use crate::lifecycle::LifecycleError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

type ReadyCallback = Box<dyn FnOnce(Option<LifecycleError>) + Send>;

/// Resolved value: `None` while pending, `Some(None)` on success,
/// `Some(Some(err))` on failure.
type Outcome = Option<Option<LifecycleError>>;

#[derive(Default)]
struct SignalState {
    outcome: Outcome,
    callbacks: Vec<ReadyCallback>,
}

struct SignalInner {
    state: Mutex<SignalState>,
    watch: watch::Sender<Outcome>,
}

/// One-shot readiness notification
///
/// Resolves at most once. Callbacks registered through
/// [`on_ready`](Self::on_ready) run exactly once each, on a fresh Tokio task,
/// whether they were registered before or after resolution.
#[derive(Clone)]
pub struct ReadySignal {
    inner: Arc<SignalInner>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    pub fn new() -> Self {
        let (watch, _) = watch::channel(None);
        Self {
            inner: Arc::new(SignalInner {
                state: Mutex::new(SignalState::default()),
                watch,
            }),
        }
    }

    /// Settle the signal. Returns `false` if it had already been settled,
    /// in which case nothing happens.
    pub fn resolve(&self, err: Option<LifecycleError>) -> bool {
        let callbacks = {
            let mut state = self.lock();
            if state.outcome.is_some() {
                return false;
            }
            state.outcome = Some(err.clone());
            std::mem::take(&mut state.callbacks)
        };
        self.inner.watch.send_replace(Some(err.clone()));
        if !callbacks.is_empty() {
            tokio::spawn(async move {
                for callback in callbacks {
                    callback(err.clone());
                }
            });
        }
        true
    }

    /// Run `callback` once the signal settles (next tick if it already has).
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(Option<LifecycleError>) + Send + 'static,
    {
        let mut state = self.lock();
        match state.outcome.clone() {
            Some(err) => {
                drop(state);
                tokio::spawn(async move { callback(err) });
            }
            None => state.callbacks.push(Box::new(callback)),
        }
    }

    /// Wait until the signal settles.
    pub async fn wait(&self) -> Result<(), LifecycleError> {
        let mut rx = self.inner.watch.subscribe();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());
        match outcome {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.lock().outcome.is_some()
    }

    /// `None` while pending, otherwise the settled error (if any).
    pub fn outcome(&self) -> Outcome {
        self.lock().outcome.clone()
    }

    /// Forget callbacks that have not run yet.
    pub fn clear_callbacks(&self) {
        self.lock().callbacks.clear();
    }

    fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn resolves_only_once() {
        let signal = ReadySignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        signal.on_ready(move |err| {
            assert!(err.is_none());
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(signal.resolve(None));
        assert!(!signal.resolve(Some(LifecycleError::init_failed("late"))));
        signal.wait().await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.outcome(), Some(None));
    }

    #[tokio::test]
    async fn late_listeners_still_fire() {
        let signal = ReadySignal::new();
        signal.resolve(Some(LifecycleError::init_failed("db")));

        let (tx, rx) = tokio::sync::oneshot::channel();
        signal.on_ready(move |err| {
            let _ = tx.send(err);
        });

        assert_eq!(rx.await.unwrap(), Some(LifecycleError::init_failed("db")));
        assert_eq!(signal.wait().await, Err(LifecycleError::init_failed("db")));
    }
}
