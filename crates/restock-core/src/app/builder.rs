//! PollLoopBuilder - poll loop の構築とワイヤリング
//!
//! 起動時検証（Fail-fast）: 必須の協調者が欠けていれば build() が BuildError を返す。

use std::sync::Arc;
use std::time::Duration;

use crate::app::detector::RestockDetector;
use crate::app::poll_loop::PollLoop;
use crate::config::ServiceConfig;
use crate::ports::{InventoryService, NotificationSource};
use crate::queue::{DispatchQueue, RetryPolicy};

/// # 使用例
/// ```ignore
/// let poll_loop = PollLoopBuilder::new()
///     .source(source)
///     .inventory(inventory)
///     .queue(queue.clone())
///     .configure(&config)
///     .build()?;
/// ```
pub struct PollLoopBuilder {
    source: Option<Arc<dyn NotificationSource>>,
    inventory: Option<Arc<dyn InventoryService>>,
    queue: Option<DispatchQueue>,
    refresh_interval: Duration,
    retry: RetryPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing components: {0:?}. These must be set before build().")]
    MissingComponents(Vec<&'static str>),
}

impl PollLoopBuilder {
    pub fn new() -> Self {
        Self {
            source: None,
            inventory: None,
            queue: None,
            refresh_interval: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn source(mut self, source: Arc<dyn NotificationSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn inventory(mut self, inventory: Arc<dyn InventoryService>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// The producer side of the queue the Email Sender consumes from.
    pub fn queue(mut self, queue: DispatchQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn fetch_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Apply refresh interval and retry policy from config.
    pub fn configure(mut self, config: &ServiceConfig) -> Self {
        self.refresh_interval = config.refresh_interval;
        self.retry = config.retry_policy();
        self
    }

    pub fn build(self) -> Result<PollLoop, BuildError> {
        let mut missing = Vec::new();
        if self.source.is_none() {
            missing.push("source");
        }
        if self.inventory.is_none() {
            missing.push("inventory");
        }
        if self.queue.is_none() {
            missing.push("queue");
        }

        match (self.source, self.inventory, self.queue) {
            (Some(source), Some(inventory), Some(queue)) => Ok(PollLoop::new(
                source,
                RestockDetector::new(inventory),
                queue,
                self.refresh_interval,
                self.retry,
            )),
            _ => Err(BuildError::MissingComponents(missing)),
        }
    }
}

impl Default for PollLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
