use stagehand::prelude::*;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

fn snapshot(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

struct SlowLoad {
    delay: Option<Duration>,
}

#[async_trait]
impl BootHook for SlowLoad {
    fn phases(&self) -> &[HookPhase] {
        &[HookPhase::DidLoad]
    }

    async fn did_load(&self) -> Result<(), LifecycleError> {
        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => std::future::pending::<()>().await,
        }
        Ok(())
    }
}

struct Passive;

impl BootHook for Passive {
    fn phases(&self) -> &[HookPhase] {
        &[]
    }
}

struct Tracer {
    name: &'static str,
    log: Log,
    fail_did_load: bool,
    fail_did_ready: bool,
}

impl Tracer {
    fn new(name: &'static str, log: &Log) -> Self {
        Self {
            name,
            log: Arc::clone(log),
            fail_did_load: false,
            fail_did_ready: false,
        }
    }
}

#[async_trait]
impl BootHook for Tracer {
    fn phases(&self) -> &[HookPhase] {
        &[
            HookPhase::ConfigDidLoad,
            HookPhase::DidLoad,
            HookPhase::WillReady,
            HookPhase::DidReady,
        ]
    }

    fn config_did_load(&self) -> Result<(), LifecycleError> {
        push(&self.log, format!("{}.configDidLoad", self.name));
        Ok(())
    }

    async fn did_load(&self) -> Result<(), LifecycleError> {
        push(&self.log, format!("{}.didLoad", self.name));
        if self.fail_did_load {
            return Err(LifecycleError::init_failed(format!("{} cannot load", self.name)));
        }
        Ok(())
    }

    async fn will_ready(&self) -> Result<(), LifecycleError> {
        push(&self.log, format!("{}.willReady", self.name));
        Ok(())
    }

    async fn did_ready(&self, _err: Option<LifecycleError>) -> Result<(), LifecycleError> {
        push(&self.log, format!("{}.didReady", self.name));
        if self.fail_did_ready {
            return Err(LifecycleError::hook_failed(self.name, "did ready"));
        }
        Ok(())
    }
}

fn lifecycle(timeout: Duration) -> Arc<Lifecycle<()>> {
    Lifecycle::new(LifecycleOptions::default().with_ready_timeout(timeout))
}

#[tokio::test(start_paused = true)]
async fn ready_waits_for_slow_did_load() {
    let lifecycle = lifecycle(Duration::from_secs(10));
    lifecycle
        .add_hook("a.rs", |_: &()| SlowLoad {
            delay: Some(Duration::from_millis(5)),
        })
        .unwrap();
    lifecycle.add_hook("b.rs", |_: &()| Passive).unwrap();
    lifecycle.init(&()).unwrap();

    let started = Instant::now();
    lifecycle.trigger_config_will_load().unwrap();
    lifecycle.wait_ready().await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(5));
}

#[tokio::test(start_paused = true)]
async fn stuck_did_load_reports_timeout_and_keeps_waiting() {
    let lifecycle = lifecycle(Duration::from_millis(50));
    let mut events = lifecycle.subscribe();
    lifecycle.add_hook("a.rs", |_: &()| SlowLoad { delay: None }).unwrap();
    lifecycle.add_hook("b.rs", |_: &()| Passive).unwrap();
    lifecycle.init(&()).unwrap();

    lifecycle.trigger_config_will_load().unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let mut timeouts = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let LifecycleEvent::ReadyTimeout(name) = event {
            timeouts.push(name);
        }
    }
    assert_eq!(timeouts, vec!["a.rs:didLoad".to_string()]);
    assert!(!lifecycle.is_ready());
}

#[tokio::test]
async fn config_did_load_follows_registration_order() {
    let log = Log::default();
    let lifecycle = lifecycle(Duration::from_secs(10));
    for name in ["A", "B", "C"] {
        let log = Arc::clone(&log);
        lifecycle
            .add_hook(format!("{name}.rs"), move |_: &()| Tracer::new(name, &log))
            .unwrap();
    }
    lifecycle.init(&()).unwrap();
    lifecycle.trigger_config_will_load().unwrap();
    lifecycle.wait_ready().await.unwrap();

    let config: Vec<String> = snapshot(&log)
        .into_iter()
        .filter(|e| e.ends_with("configDidLoad"))
        .collect();
    assert_eq!(config, ["A.configDidLoad", "B.configDidLoad", "C.configDidLoad"]);
}

#[tokio::test]
async fn failing_did_load_fails_startup_before_will_ready() {
    let log = Log::default();
    let lifecycle = lifecycle(Duration::from_secs(10));
    let failing = Arc::clone(&log);
    lifecycle
        .add_hook("a.rs", move |_: &()| Tracer {
            fail_did_load: true,
            ..Tracer::new("a", &failing)
        })
        .unwrap();
    let healthy = Arc::clone(&log);
    lifecycle
        .add_hook("b.rs", move |_: &()| Tracer::new("b", &healthy))
        .unwrap();
    lifecycle.init(&()).unwrap();

    lifecycle.trigger_config_will_load().unwrap();
    let err = lifecycle.wait_ready().await.unwrap_err();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(err, LifecycleError::init_failed("a cannot load"));
    assert!(!snapshot(&log).iter().any(|e| e.ends_with("willReady")));
}

#[tokio::test]
async fn failing_did_ready_does_not_stop_the_next_hook() {
    let log = Log::default();
    let lifecycle = lifecycle(Duration::from_secs(10));
    let mut events = lifecycle.subscribe();
    let first = Arc::clone(&log);
    lifecycle
        .add_hook("a.rs", move |_: &()| Tracer {
            fail_did_ready: true,
            ..Tracer::new("a", &first)
        })
        .unwrap();
    let second = Arc::clone(&log);
    lifecycle
        .add_hook("b.rs", move |_: &()| Tracer::new("b", &second))
        .unwrap();
    lifecycle.init(&()).unwrap();

    lifecycle.trigger_config_will_load().unwrap();
    lifecycle.wait_ready().await.unwrap();

    let error = loop {
        match events.recv().await.unwrap() {
            LifecycleEvent::Error(err) => break err,
            _ => continue,
        }
    };
    assert_eq!(error, LifecycleError::hook_failed("a", "did ready"));

    tokio::time::sleep(Duration::from_millis(20)).await;
    let did_ready: Vec<String> = snapshot(&log)
        .into_iter()
        .filter(|e| e.ends_with("didReady"))
        .collect();
    assert_eq!(did_ready, ["a.didReady", "b.didReady"]);
}

#[tokio::test]
async fn teardown_skips_entry_removed_while_another_runs() {
    let log = Log::default();
    let lifecycle = lifecycle(Duration::from_secs(10));

    let x = Arc::clone(&log);
    lifecycle
        .register_before_close("x", move || async move {
            push(&x, "x");
            Ok(())
        })
        .unwrap();
    let y_log = Arc::clone(&log);
    let y = lifecycle
        .register_before_close("y", move || async move {
            push(&y_log, "y");
            Ok(())
        })
        .unwrap();
    let z = Arc::clone(&log);
    let controller = Arc::clone(&lifecycle);
    lifecycle
        .register_before_close("z", move || async move {
            push(&z, "z");
            tokio::task::yield_now().await;
            controller.remove_before_close(y);
            Ok(())
        })
        .unwrap();

    let mut events = lifecycle.subscribe();
    lifecycle.close().await;

    assert_eq!(snapshot(&log), ["z", "x"]);
    assert_eq!(events.recv().await.unwrap(), LifecycleEvent::Close);
}
