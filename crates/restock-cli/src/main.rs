//! restock - 再入荷通知サービス
//!
//! JSON fixture（`RESTOCK_FIXTURE`）を通知ストア兼在庫サービスとして使い、
//! メールは送らずにログに出す。fixture を実行中に書き換えれば新しい通知や
//! 在庫の復活がそのまま次のサイクルに反映される。

mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use restock_core::app::{PollLoopBuilder, SenderLoop};
use restock_core::config::{Environment, FromEnv, ServiceConfig, env_required};
use restock_core::error::PollError;
use restock_core::impls::{CachingInventory, FixtureBackend, LogEmailSender};
use restock_core::ports::{Clock, InventoryService, NotificationSource, SystemClock};
use restock_core::queue::DispatchQueue;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing(Environment::from_env());

    let config = match ServiceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    let fixture = match env_required("RESTOCK_FIXTURE") {
        Ok(path) => path,
        Err(e) => {
            error!(error = %e, "no fixture file given");
            return ExitCode::FAILURE;
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backend = Arc::new(FixtureBackend::new(fixture, clock.clone()));
    let source: Arc<dyn NotificationSource> = backend.clone();
    let inventory: Arc<dyn InventoryService> = match config.product_cache_ttl {
        Some(ttl) => {
            info!(ttl_secs = ttl.as_secs(), "product cache enabled");
            Arc::new(CachingInventory::new(backend.clone(), clock.clone(), ttl)) as Arc<dyn InventoryService>
        }
        None => backend.clone() as Arc<dyn InventoryService>,
    };
    info!(fixture = %backend.path().display(), "using fixture backend");

    let queue = match DispatchQueue::new(config.queue_capacity) {
        Ok(queue) => queue,
        Err(e) => {
            error!(error = %e, "failed to create dispatch queue");
            return ExitCode::FAILURE;
        }
    };
    let sender =
        SenderLoop::new(queue.clone(), Arc::new(LogEmailSender), source.clone(), clock).spawn();

    let poll_loop = match PollLoopBuilder::new()
        .source(source)
        .inventory(inventory)
        .queue(queue)
        .configure(&config)
        .build()
    {
        Ok(poll_loop) => poll_loop,
        Err(e) => {
            error!(error = %e, "failed to build poll loop");
            return ExitCode::FAILURE;
        }
    };

    let Err(e) = poll_loop.run().await;
    match &e {
        PollError::SourceExhausted { cursor, .. } => {
            let last_cursor = cursor.map(|c| c.to_rfc3339()).unwrap_or_default();
            error!(error = %e, last_cursor = %last_cursor, "notification source is down, stopping");
        }
        PollError::Queue(_) => error!(error = %e, "dispatch queue failed, stopping"),
    }

    let stats = sender.shutdown_and_join().await;
    info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "shutdown complete"
    );
    ExitCode::FAILURE
}
