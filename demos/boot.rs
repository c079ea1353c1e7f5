use stagehand::prelude::*;
use std::time::Duration;

/// Pretends to open a connection pool during the load phase.
struct DatabaseBoot {
    app_name: String,
}

#[async_trait]
impl BootHook for DatabaseBoot {
    fn phases(&self) -> &[HookPhase] {
        &[HookPhase::DidLoad, HookPhase::DidReady, HookPhase::BeforeClose]
    }

    async fn did_load(&self) -> Result<(), LifecycleError> {
        tracing::info!("{}: connecting to database", self.app_name);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn did_ready(&self, err: Option<LifecycleError>) -> Result<(), LifecycleError> {
        tracing::info!("database sees application ready (error: {:?})", err);
        Ok(())
    }

    async fn before_close(&self) -> Result<(), LifecycleError> {
        tracing::info!("closing database pool");
        Ok(())
    }
}

struct CacheBoot;

#[async_trait]
impl BootHook for CacheBoot {
    fn phases(&self) -> &[HookPhase] {
        &[HookPhase::WillReady, HookPhase::ServerDidReady, HookPhase::BeforeClose]
    }

    async fn will_ready(&self) -> Result<(), LifecycleError> {
        tracing::info!("warming cache");
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(())
    }

    async fn server_did_ready(&self) -> Result<(), LifecycleError> {
        tracing::info!("cache notified: server is listening");
        Ok(())
    }

    async fn before_close(&self) -> Result<(), LifecycleError> {
        tracing::info!("flushing cache");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    tracing::info!("🚀 Starting boot demo...");

    let app = Application::builder()
        .name("demo")
        .ready_timeout(Duration::from_secs(5))
        .base_dir("/srv/demo")
        .boot_hook("/srv/demo/plugins/database/app.rs", |app: &Application| {
            DatabaseBoot {
                app_name: app.name().to_string(),
            }
        })
        .boot_hook("/srv/demo/plugins/cache/app.rs", |_: &Application| CacheBoot)
        .function_hook("/srv/demo/app.rs", |app: &Application| {
            tracing::info!("{} config loaded", app.name());
            Ok(())
        })
        .start()
        .await
        .expect("Failed to start application");

    app.server_did_ready();
    tokio::time::sleep(Duration::from_millis(10)).await;

    app.close().await;

    match app.timing().to_json() {
        Ok(json) => tracing::info!("boot timing: {}", json),
        Err(e) => tracing::error!("failed to dump timing: {}", e),
    }
}
