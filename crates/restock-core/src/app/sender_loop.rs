//! SenderLoop - DispatchQueue の consumer 側
//!
//! EmailJob を1件ずつ取り出し、compose() してから EmailSender に渡す。
//! 送信できたら Notification Store 側で送信済みにする（再起動後に再送しないため）。
//! 送信失敗はログに残して次へ進む（再送はしない）。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ports::{Clock, EmailSender, NotificationSource};
use crate::queue::DispatchQueue;

/// How long one pop waits before re-checking for shutdown.
const POP_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    pub delivered: u64,
    pub failed: u64,
    /// Delivered, but the store could not be told.
    pub unmarked: u64,
}

pub struct SenderLoop {
    queue: DispatchQueue,
    sender: Arc<dyn EmailSender>,
    store: Arc<dyn NotificationSource>,
    clock: Arc<dyn Clock>,
}

/// Handle to a running [`SenderLoop`].
/// - `request_shutdown()` で新しい job を取らなくなる
/// - `shutdown_and_join()` で送信中の1件が終わるのを待つ
pub struct SenderHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<SenderStats>,
}

impl SenderLoop {
    pub fn new(
        queue: DispatchQueue,
        sender: Arc<dyn EmailSender>,
        store: Arc<dyn NotificationSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            queue,
            sender,
            store,
            clock,
        }
    }

    pub fn spawn(self) -> SenderHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        SenderHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) -> SenderStats {
        let mut stats = SenderStats::default();
        loop {
            // handle が drop されても止まる
            if *shutdown_rx.borrow_and_update() || shutdown_rx.has_changed().is_err() {
                break;
            }

            // shutdown は pop の合間にだけ見る。pop を途中で捨てると取り出し済みの job が消える
            let job = match self.queue.pop_timeout(POP_TIMEOUT).await {
                Ok(Some(job)) => job,
                Ok(None) => continue,
                Err(error) => {
                    warn!(error = %error, "dispatch queue pop failed");
                    continue;
                }
            };

            let message = job.compose();
            match self.sender.send(&message).await {
                Ok(()) => {
                    stats.delivered += 1;
                    debug!(id = %job.notification.id, to = %message.to, "notification delivered");
                    let id = &job.notification.id;
                    if let Err(error) = self.store.mark_sent(id, self.clock.now()).await {
                        stats.unmarked += 1;
                        warn!(id = %id, error = %error, "failed to mark notification as sent");
                    }
                }
                Err(error) => {
                    stats.failed += 1;
                    warn!(
                        id = %job.notification.id,
                        variant = %job.variant.id,
                        error = %error,
                        "notification email failed"
                    );
                }
            }
        }
        info!(
            delivered = stats.delivered,
            failed = stats.failed,
            unmarked = stats.unmarked,
            "sender loop stopped"
        );
        stats
    }
}

impl SenderHandle {
    pub fn request_shutdown(&self) {
        // receiver may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    /// Stop taking jobs and wait for the loop to finish. Jobs still in the
    /// queue stay there.
    pub async fn shutdown_and_join(self) -> SenderStats {
        self.request_shutdown();
        match self.join.await {
            Ok(stats) => stats,
            Err(error) => {
                warn!(error = %error, "sender loop task failed");
                SenderStats::default()
            }
        }
    }
}
