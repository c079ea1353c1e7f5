//! Teardown Sequencer
//!
//! Shutdown callbacks run in reverse registration order: first created,
//! last closed.

use super::{HookFuture, LifecycleError, traits::run_guarded};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

type CloseFn = Box<dyn FnOnce() -> HookFuture + Send>;

/// Handle for removing a teardown entry before it runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TeardownId(u64);

struct Entry {
    id: TeardownId,
    name: String,
    callback: CloseFn,
}

#[derive(Default)]
struct Entries {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Ordered set of close callbacks
///
/// Each entry is taken out of the set right before it runs, so an entry can
/// run at most once even if `drain` is called again or concurrently, and an
/// entry removed while another one is running is simply skipped.
#[derive(Default)]
pub struct Teardown {
    entries: Mutex<Entries>,
}

impl Teardown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&self, name: impl Into<String>, callback: F) -> TeardownId
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), LifecycleError>> + Send + 'static,
    {
        let mut entries = self.lock();
        let id = TeardownId(entries.next_id);
        entries.next_id += 1;
        entries.entries.push(Entry {
            id,
            name: name.into(),
            callback: Box::new(move || Box::pin(callback()) as HookFuture),
        });
        id
    }

    /// Returns `false` if the entry already ran or was removed.
    pub fn remove(&self, id: TeardownId) -> bool {
        self.take(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Run every entry present at call time, last registered first, awaiting
    /// each one. Failures are handed to `on_error` and do not stop the drain.
    ///
    /// Entries registered while draining are left for the next drain.
    pub async fn drain<E>(&self, mut on_error: E) -> usize
    where
        E: FnMut(&str, LifecycleError),
    {
        let snapshot: Vec<TeardownId> = self.lock().entries.iter().map(|e| e.id).collect();
        let mut ran = 0;
        for id in snapshot.into_iter().rev() {
            let Some(entry) = self.take(id) else {
                continue;
            };
            tracing::debug!("run close callback {}", entry.name);
            if let Err(err) = run_guarded(&entry.name, (entry.callback)()).await {
                on_error(&entry.name, err);
            }
            ran += 1;
        }
        ran
    }

    fn take(&self, id: TeardownId) -> Option<Entry> {
        let mut entries = self.lock();
        let index = entries.entries.iter().position(|e| e.id == id)?;
        Some(entries.entries.remove(index))
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
