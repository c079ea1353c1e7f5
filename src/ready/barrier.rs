use super::ReadySignal;
use crate::config::DEFAULT_READY_TIMEOUT;
use crate::event::{EventBus, LifecycleEvent, ReadyStat};
use crate::lifecycle::LifecycleError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReadyOptions {
    /// Deadline for each task before a `ready_timeout` is reported
    pub timeout: Duration,
    /// Only evaluate emptiness after [`Ready::start`]
    pub lazy_start: bool,
}

impl Default for ReadyOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_READY_TIMEOUT,
            lazy_start: false,
        }
    }
}

impl ReadyOptions {
    pub fn lazy(timeout: Duration) -> Self {
        Self {
            timeout,
            lazy_start: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Overrides the barrier-wide timeout for this task
    pub timeout: Option<Duration>,
    /// A weak dependency's failure is logged and counted as completion
    pub weak: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(Uuid);

impl TaskId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

struct PendingTask {
    id: TaskId,
    name: String,
    timeout: Duration,
    weak: bool,
    registered_at: Instant,
    timer: Option<AbortHandle>,
}

impl PendingTask {
    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

#[derive(Default)]
struct BarrierState {
    started: bool,
    settled: bool,
    pending: Vec<PendingTask>,
}

impl BarrierState {
    fn pending_names(&self) -> Vec<String> {
        self.pending.iter().map(|task| task.name.clone()).collect()
    }
}

struct Inner {
    options: ReadyOptions,
    state: Mutex<BarrierState>,
    signal: ReadySignal,
    events: EventBus,
}

/// Counting readiness barrier
///
/// Tracks an open set of named tasks and settles once when the set drains
/// (success) or when any non-weak task fails (first error wins). Names are
/// labels only: registering the same name twice opens two independent slots.
///
/// Timeouts are diagnostic. A task still pending after its deadline produces a
/// [`LifecycleEvent::ReadyTimeout`] but stays pending.
#[derive(Clone)]
pub struct Ready {
    inner: Arc<Inner>,
}

impl Ready {
    /// Create a barrier with its own event bus.
    ///
    /// A non-lazy barrier checks for emptiness on the next tick, so it must be
    /// created inside a Tokio runtime.
    pub fn new(options: ReadyOptions) -> Self {
        Self::with_events(options, EventBus::new())
    }

    /// Create a barrier that publishes its stat, timeout and error events on
    /// `events`.
    pub fn with_events(options: ReadyOptions, events: EventBus) -> Self {
        let lazy = options.lazy_start;
        let ready = Self {
            inner: Arc::new(Inner {
                options,
                state: Mutex::new(BarrierState {
                    started: !lazy,
                    ..Default::default()
                }),
                signal: ReadySignal::new(),
                events,
            }),
        };
        if !lazy {
            ready.inner.schedule_check();
        }
        ready
    }

    /// Mark the barrier active and arm deadlines of tasks registered so far.
    ///
    /// If nothing is pending the barrier settles on the next tick.
    pub fn start(&self) {
        {
            let mut state = self.inner.lock();
            state.started = true;
            for task in state.pending.iter_mut().filter(|t| t.timer.is_none()) {
                task.timer = Some(self.inner.arm_timer(task.id, task.timeout));
            }
        }
        self.inner.schedule_check();
    }

    pub fn register(&self, name: impl Into<String>) -> TaskDone {
        self.register_with(name, TaskOptions::default())
    }

    /// Open one pending slot and return the handle that closes it.
    pub fn register_with(&self, name: impl Into<String>, options: TaskOptions) -> TaskDone {
        let name = name.into();
        let id = TaskId::new();
        let mut state = self.inner.lock();
        if state.settled {
            tracing::warn!("ready task {} registered after the barrier settled, ignored", name);
            return TaskDone::new(self.inner.clone(), id, name);
        }

        let timeout = options.timeout.unwrap_or(self.inner.options.timeout);
        let timer = state
            .started
            .then(|| self.inner.arm_timer(id, timeout));
        tracing::debug!("register ready task {} ({:?})", name, id);
        state.pending.push(PendingTask {
            id,
            name: name.clone(),
            timeout,
            weak: options.weak,
            registered_at: Instant::now(),
            timer,
        });
        TaskDone::new(self.inner.clone(), id, name)
    }

    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce(Option<LifecycleError>) + Send + 'static,
    {
        self.inner.signal.on_ready(callback);
    }

    pub async fn wait(&self) -> Result<(), LifecycleError> {
        self.inner.signal.wait().await
    }

    pub fn is_ready(&self) -> bool {
        self.inner.signal.is_ready()
    }

    pub fn is_started(&self) -> bool {
        self.inner.lock().started
    }

    /// Names of tasks still pending, in registration order
    pub fn pending(&self) -> Vec<String> {
        self.inner.lock().pending_names()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, BarrierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_check(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move { inner.settle_if_drained() });
    }

    fn settle_if_drained(&self) {
        {
            let mut state = self.lock();
            if state.settled || !state.started || !state.pending.is_empty() {
                return;
            }
            state.settled = true;
        }
        tracing::debug!("ready barrier drained");
        self.signal.resolve(None);
    }

    fn arm_timer(self: &Arc<Self>, id: TaskId, timeout: Duration) -> AbortHandle {
        let inner = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(inner) = inner.upgrade() {
                inner.report_timeout(id);
            }
        })
        .abort_handle()
    }

    fn report_timeout(&self, id: TaskId) {
        let (name, elapsed) = {
            let state = self.lock();
            let Some(task) = state.pending.iter().find(|t| t.id == id) else {
                return;
            };
            (task.name.clone(), task.registered_at.elapsed())
        };
        tracing::warn!(
            "[stagehand:ready_timeout] {} seconds later {} was still unable to finish.",
            elapsed.as_secs_f64(),
            name
        );
        self.events.publish(LifecycleEvent::ReadyTimeout(name));
    }

    fn finish(&self, id: TaskId, result: Result<(), LifecycleError>) {
        let mut state = self.lock();
        let Some(index) = state.pending.iter().position(|t| t.id == id) else {
            return;
        };
        let mut task = state.pending.remove(index);
        task.disarm();

        // First error wins; everything after settling only clears its slot.
        if state.settled {
            return;
        }

        match result {
            Err(err) if !task.weak => {
                state.settled = true;
                drop(state);
                tracing::error!("ready task {} failed: {}", task.name, err);
                self.events.publish(LifecycleEvent::Error(err.clone()));
                self.signal.resolve(Some(err));
                return;
            }
            Err(err) => {
                tracing::warn!("weak ready task {} failed, ignored: {}", task.name, err);
            }
            Ok(()) => {}
        }

        let stat = ReadyStat {
            id: task.name,
            remaining: state.pending.len(),
            pending: state.pending_names(),
        };
        let drained = state.started && state.pending.is_empty();
        if drained {
            state.settled = true;
        }
        drop(state);

        tracing::info!(
            "[stagehand:ready_stat] end ready task {}, remain {:?}",
            stat.id,
            stat.pending
        );
        self.events.publish(LifecycleEvent::ReadyStat(stat));
        if drained {
            self.signal.resolve(None);
        }
    }
}

/// Completion handle for one pending slot
///
/// Consuming `self` makes double completion impossible. A handle dropped
/// without completing leaves its slot pending.
#[must_use = "the task stays pending until its handle is completed"]
pub struct TaskDone {
    inner: Arc<Inner>,
    id: TaskId,
    name: String,
}

impl TaskDone {
    fn new(inner: Arc<Inner>, id: TaskId, name: String) -> Self {
        Self { inner, id, name }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn done(self) {
        self.complete(Ok(()));
    }

    pub fn fail(self, err: LifecycleError) {
        self.complete(Err(err));
    }

    pub fn complete(self, result: Result<(), LifecycleError>) {
        self.inner.finish(self.id, result);
    }
}

impl std::fmt::Debug for TaskDone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDone")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::broadcast::error::TryRecvError;

    fn counter(ready: &Ready) -> Arc<AtomicUsize> {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        ready.on_ready(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        calls
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn fires_once_after_all_tasks_complete() {
        let ready = Ready::new(ReadyOptions::default());
        let calls = counter(&ready);
        let a = ready.register("a");
        let b = ready.register("b");
        let c = ready.register("c");

        b.done();
        c.done();
        assert!(!ready.is_ready());
        a.done();

        ready.wait().await.unwrap();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_names_are_independent_slots() {
        let ready = Ready::new(ReadyOptions::default());
        let first = ready.register("cache");
        let second = ready.register("cache");

        first.done();
        settle().await;
        assert!(!ready.is_ready());
        assert_eq!(ready.pending(), vec!["cache".to_string()]);

        second.done();
        ready.wait().await.unwrap();
    }

    #[tokio::test]
    async fn first_error_wins() {
        let ready = Ready::new(ReadyOptions::default());
        let mut events = ready.events().subscribe();
        let calls = counter(&ready);
        let a = ready.register("a");
        let b = ready.register("b");
        let c = ready.register("c");

        a.fail(LifecycleError::init_failed("first"));
        b.fail(LifecycleError::init_failed("second"));
        c.done();

        assert_eq!(
            ready.wait().await,
            Err(LifecycleError::init_failed("first"))
        );
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            events.try_recv().unwrap(),
            LifecycleEvent::Error(LifecycleError::init_failed("first"))
        );
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test]
    async fn weak_task_failure_counts_as_completion() {
        let ready = Ready::new(ReadyOptions::default());
        let optional = ready.register_with(
            "metrics",
            TaskOptions {
                weak: true,
                ..Default::default()
            },
        );
        optional.fail(LifecycleError::init_failed("no collector"));
        assert_eq!(ready.wait().await, Ok(()));
    }

    #[tokio::test]
    async fn stat_reports_remaining_tasks() {
        let ready = Ready::new(ReadyOptions::default());
        let mut events = ready.events().subscribe();
        let a = ready.register("a");
        let _b = ready.register("b");

        a.done();
        assert_eq!(
            events.recv().await.unwrap(),
            LifecycleEvent::ReadyStat(ReadyStat {
                id: "a".into(),
                remaining: 1,
                pending: vec!["b".into()],
            })
        );
    }

    #[tokio::test]
    async fn eager_barrier_without_tasks_fires_next_tick() {
        let ready = Ready::new(ReadyOptions::default());
        assert!(!ready.is_ready());
        settle().await;
        assert!(ready.is_ready());
    }

    #[tokio::test]
    async fn lazy_barrier_waits_for_start() {
        let ready = Ready::new(ReadyOptions::lazy(Duration::from_secs(1)));
        settle().await;
        assert!(!ready.is_ready());

        ready.start();
        ready.wait().await.unwrap();
    }

    #[tokio::test]
    async fn lazy_barrier_ignores_drain_before_start() {
        let ready = Ready::new(ReadyOptions::lazy(Duration::from_secs(1)));
        ready.register("early").done();
        settle().await;
        assert!(!ready.is_ready());

        ready.start();
        ready.wait().await.unwrap();
    }

    #[tokio::test]
    async fn completion_after_settle_is_ignored() {
        let ready = Ready::new(ReadyOptions::default());
        let a = ready.register("a");
        let b = ready.register("b");
        a.fail(LifecycleError::init_failed("a"));
        b.done();
        let late = ready.register("late");
        late.done();
        assert_eq!(ready.wait().await, Err(LifecycleError::init_failed("a")));
        assert!(ready.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_names_outstanding_task_without_completing_it() {
        let ready = Ready::new(ReadyOptions {
            timeout: Duration::from_millis(50),
            lazy_start: false,
        });
        let mut events = ready.events().subscribe();
        let fast = ready.register("fast");
        let _slow = ready.register("slow");
        fast.done();

        tokio::time::sleep(Duration::from_millis(60)).await;

        let mut timeouts = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let LifecycleEvent::ReadyTimeout(name) = event {
                timeouts.push(name);
            }
        }
        assert_eq!(timeouts, vec!["slow".to_string()]);
        assert!(!ready.is_ready());
        assert_eq!(ready.pending(), vec!["slow".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn per_task_timeout_overrides_default() {
        let ready = Ready::new(ReadyOptions::default());
        let mut events = ready.events().subscribe();
        let _task = ready.register_with(
            "quick",
            TaskOptions {
                timeout: Some(Duration::from_millis(10)),
                ..Default::default()
            },
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            events.try_recv().unwrap(),
            LifecycleEvent::ReadyTimeout("quick".into())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn lazy_barrier_arms_timers_at_start() {
        let ready = Ready::new(ReadyOptions::lazy(Duration::from_millis(50)));
        let mut events = ready.events().subscribe();
        let _task = ready.register("boot");

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(events.try_recv(), Err(TryRecvError::Empty));

        ready.start();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(
            events.try_recv().unwrap(),
            LifecycleEvent::ReadyTimeout("boot".into())
        );
    }
}
