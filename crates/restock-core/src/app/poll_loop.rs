//! PollLoop - 再入荷の検知と EmailJob の投入を行うメインループ
//!
//! # 状態遷移
//! ```text
//! INIT -> FETCH_INITIAL -> MERGE -> DETECT -> DRAIN_AND_ENQUEUE -> REPORT -> SLEEP -> FETCH_DELTA
//!                            ^                                                          |
//!                            +----------------------------------------------------------+
//! ```
//!
//! # 並行性
//! - 制御スレッドは1本。外部呼び出しは1つずつ await する
//! - DispatchQueue だけが consumer（Email Sender）と共有される
//! - DedupTracker / PendingIndex / カウンタはこのループだけが触る
//!
//! 正常系に終了状態はない。通知ソースの取得がリトライ上限まで失敗したときだけ
//! `PollError::SourceExhausted` で抜ける。

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::app::detector::RestockDetector;
use crate::app::status::CycleReport;
use crate::dedup::DedupTracker;
use crate::domain::{EmailJob, NotificationBatch, NotificationRecord};
use crate::error::PollError;
use crate::pending::PendingIndex;
use crate::ports::NotificationSource;
use crate::queue::{DispatchQueue, RetryPolicy};

/// Where the loop currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    FetchInitial,
    Merge,
    Detect,
    DrainAndEnqueue,
    Report,
    Sleep,
    FetchDelta,
}

#[derive(Debug, Clone, Copy)]
enum FetchRequest {
    AllUnsent,
    Since(DateTime<Utc>),
}

pub struct PollLoop {
    source: Arc<dyn NotificationSource>,
    detector: RestockDetector,
    queue: DispatchQueue,
    seen: DedupTracker,
    pending: PendingIndex,
    refresh_interval: Duration,
    retry: RetryPolicy,
    /// Server-reported timestamp of the last successful fetch.
    cursor: Option<DateTime<Utc>>,
    /// Jobs pushed onto the queue over the whole run.
    handed_off: usize,
    cycles: u64,
    phase: Phase,
}

impl PollLoop {
    pub(crate) fn new(
        source: Arc<dyn NotificationSource>,
        detector: RestockDetector,
        queue: DispatchQueue,
        refresh_interval: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            source,
            detector,
            queue,
            seen: DedupTracker::new(),
            pending: PendingIndex::new(),
            refresh_interval,
            retry,
            cursor: None,
            handed_off: 0,
            cycles: 0,
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> Option<DateTime<Utc>> {
        self.cursor
    }

    pub fn pending(&self) -> &PendingIndex {
        &self.pending
    }

    pub fn seen(&self) -> &DedupTracker {
        &self.seen
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn handed_off(&self) -> usize {
        self.handed_off
    }

    fn enter(&mut self, phase: Phase) {
        debug!(cycle = self.cycles, ?phase, "phase");
        self.phase = phase;
    }

    /// Run forever. Returns only when a fetch exhausts its retries (or the
    /// queue's worker thread dies).
    pub async fn run(mut self) -> Result<Infallible, PollError> {
        self.enter(Phase::Init);
        info!(
            queue_capacity = self.queue.capacity(),
            refresh_secs = self.refresh_interval.as_secs(),
            "starting restock notification loop"
        );

        let mut batch = self.fetch_initial().await?;
        loop {
            self.run_cycle(batch).await?;

            self.enter(Phase::Sleep);
            tokio::time::sleep(self.refresh_interval).await;

            batch = self.fetch_delta().await?;
        }
    }

    /// FETCH_INITIAL: everything the store still has unsent. 前回の実行で
    /// pending のまま残ったレコードもここで拾い直す。
    pub async fn fetch_initial(&mut self) -> Result<Vec<NotificationRecord>, PollError> {
        self.enter(Phase::FetchInitial);
        let batch = self.fetch_with_retry(FetchRequest::AllUnsent).await?;
        self.cursor = Some(batch.as_of);
        info!(records = batch.records.len(), cursor = %batch.as_of, "initial fetch complete");
        Ok(batch.records)
    }

    /// FETCH_DELTA: records created since the cursor, minus those already
    /// seen. The cursor moves to the server's `as_of` even if nothing new
    /// arrived.
    pub async fn fetch_delta(&mut self) -> Result<Vec<NotificationRecord>, PollError> {
        self.enter(Phase::FetchDelta);
        let request = match self.cursor {
            Some(since) => FetchRequest::Since(since),
            None => FetchRequest::AllUnsent,
        };
        let batch = self.fetch_with_retry(request).await?;

        let fetched = batch.records.len();
        let records: Vec<NotificationRecord> = batch
            .records
            .into_iter()
            .filter(|r| !self.seen.has_seen(&r.id))
            .collect();
        self.cursor = Some(batch.as_of);
        debug!(
            fetched,
            duplicates = fetched - records.len(),
            cursor = %batch.as_of,
            "delta fetch complete"
        );
        Ok(records)
    }

    async fn fetch_with_retry(&self, request: FetchRequest) -> Result<NotificationBatch, PollError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let result = match request {
                FetchRequest::AllUnsent => self.source.fetch_all_unsent().await,
                FetchRequest::Since(since) => self.source.fetch_since(since).await,
            };

            match result {
                Ok(batch) => return Ok(batch),
                Err(error) if self.retry.should_retry(attempts) => {
                    let delay = self.retry.delay_with_jitter(attempts);
                    warn!(
                        attempt = attempts,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "notification fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(source) => {
                    return Err(PollError::SourceExhausted {
                        attempts,
                        cursor: self.cursor,
                        source,
                    });
                }
            }
        }
    }

    /// MERGE: add unseen records to the pending index. Returns how many
    /// were new.
    pub fn merge(&mut self, batch: Vec<NotificationRecord>) -> usize {
        self.enter(Phase::Merge);
        let mut merged = 0;
        for record in batch {
            if self.seen.has_seen(&record.id) {
                debug!(id = %record.id, "duplicate notification dropped");
                continue;
            }
            self.seen.mark_seen(record.id.clone());
            self.pending.add(record);
            merged += 1;
        }
        merged
    }

    /// One pass of MERGE -> DETECT -> DRAIN_AND_ENQUEUE -> REPORT.
    ///
    /// May wait on the queue if the sender falls behind.
    pub async fn run_cycle(
        &mut self,
        batch: Vec<NotificationRecord>,
    ) -> Result<CycleReport, PollError> {
        self.cycles += 1;
        let new = self.merge(batch);

        self.enter(Phase::Detect);
        let detection = self.detector.detect(&self.pending).await;

        self.enter(Phase::DrainAndEnqueue);
        for restocked in detection.in_stock {
            let records = self.pending.drain(restocked.variant_id);
            let count = records.len();
            let jobs: Vec<EmailJob> = records
                .into_iter()
                .map(|record| {
                    EmailJob::new(restocked.product.clone(), restocked.variant.clone(), record)
                })
                .collect();
            self.queue.push_all(jobs).await?;
            self.handed_off += count;
            info!(
                variant = %restocked.variant_id,
                product = %restocked.product.title,
                quantity = restocked.variant.inventory_quantity,
                jobs = count,
                "back in stock, notifications queued"
            );
        }

        self.enter(Phase::Report);
        let queued = self.queue.len();
        let report = CycleReport {
            cycle: self.cycles,
            new,
            total: self.seen.len(),
            sent: self.handed_off.saturating_sub(queued),
            unsent: queued + detection.unfulfilled,
            queued,
            out_of_stock: detection.unfulfilled,
            lookup_failures: detection.failures.len(),
        };
        info!(
            cycle = report.cycle,
            new = report.new,
            total = report.total,
            sent = report.sent,
            unsent = report.unsent,
            queued = report.queued,
            out_of_stock = report.out_of_stock,
            lookup_failures = report.lookup_failures,
            pending = self.pending.total(),
            "{report}"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::PollLoopBuilder;
    use crate::domain::VariantId;
    use crate::error::SourceError;
    use crate::impls::{InMemoryInventory, InMemoryNotificationSource};
    use crate::ports::FixedClock;
    use crate::testing::{at, product, record, record_at, t0, variant};

    struct Harness {
        clock: Arc<FixedClock>,
        source: Arc<InMemoryNotificationSource>,
        inventory: Arc<InMemoryInventory>,
        queue: DispatchQueue,
    }

    impl Harness {
        fn new(capacity: usize) -> Self {
            let clock = Arc::new(FixedClock::new(t0()));
            Self {
                source: Arc::new(InMemoryNotificationSource::new(clock.clone())),
                clock,
                inventory: Arc::new(InMemoryInventory::new()),
                queue: DispatchQueue::new(capacity).unwrap(),
            }
        }

        fn stock(&self, variant_id: i64, quantity: i64) {
            self.inventory.set_variant(variant(variant_id, quantity));
            self.inventory.set_product(product(variant_id));
        }

        fn builder(&self) -> PollLoopBuilder {
            PollLoopBuilder::new()
                .source(self.source.clone())
                .inventory(self.inventory.clone())
                .queue(self.queue.clone())
                .refresh_interval(Duration::ZERO)
                .fetch_retry(RetryPolicy::no_retry())
        }

        fn poll_loop(&self) -> PollLoop {
            self.builder().build().unwrap()
        }

        fn queued_ids(&self) -> Vec<String> {
            std::iter::from_fn(|| self.queue.try_pop())
                .map(|job| job.notification.id.to_string())
                .collect()
        }
    }

    fn ids(records: &[NotificationRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn restocked_variant_is_drained_in_order_with_one_product_fetch() {
        let h = Harness::new(5);
        h.stock(42, 7);
        let mut poll_loop = h.poll_loop();

        let report = poll_loop
            .run_cycle(vec![record("A", 42), record("B", 42), record("C", 42)])
            .await
            .unwrap();

        assert!(!poll_loop.pending().contains_variant(VariantId::new(42)));
        assert_eq!(h.inventory.product_lookups(), 1);

        let jobs: Vec<EmailJob> = std::iter::from_fn(|| h.queue.try_pop()).collect();
        let order: Vec<&str> = jobs.iter().map(|j| j.notification.id.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert!(jobs.iter().all(|j| j.product == product(42)));

        assert_eq!(report.new, 3);
        assert_eq!(report.total, 3);
        assert_eq!(report.queued, 3);
        assert_eq!(report.sent, 0);
        assert_eq!(report.out_of_stock, 0);
        assert_eq!(poll_loop.handed_off(), 3);
        assert_eq!(poll_loop.phase(), Phase::Report);
    }

    #[tokio::test]
    async fn out_of_stock_records_stay_put_in_order() {
        let h = Harness::new(5);
        h.stock(42, 0);
        let mut poll_loop = h.poll_loop();

        let report = poll_loop
            .run_cycle(vec![record("a", 42), record("b", 42)])
            .await
            .unwrap();
        assert_eq!(ids(poll_loop.pending().get(VariantId::new(42))), vec!["a", "b"]);
        assert_eq!(report.out_of_stock, 2);
        assert_eq!(report.unsent, 2);

        let report = poll_loop.run_cycle(Vec::new()).await.unwrap();
        assert_eq!(ids(poll_loop.pending().get(VariantId::new(42))), vec!["a", "b"]);
        assert_eq!(report.new, 0);
        assert_eq!(report.out_of_stock, 2);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn record_fetched_twice_is_merged_and_enqueued_once() {
        let h = Harness::new(5);
        h.stock(7, 0);
        h.source.insert(record_at("D", 7, t0()));
        let mut poll_loop = h.poll_loop();

        let initial = poll_loop.fetch_initial().await.unwrap();
        assert_eq!(poll_loop.run_cycle(initial).await.unwrap().new, 1);

        // the inclusive delta query returns D again; it is dropped
        let delta = poll_loop.fetch_delta().await.unwrap();
        assert!(delta.is_empty());
        let report = poll_loop.run_cycle(delta).await.unwrap();
        assert_eq!(report.new, 0);
        assert_eq!(report.total, 1);
        assert_eq!(poll_loop.pending().pending_for(VariantId::new(7)), 1);

        h.inventory.set_quantity(VariantId::new(7), 5);
        poll_loop.run_cycle(Vec::new()).await.unwrap();
        assert_eq!(h.queued_ids(), vec!["D"]);

        // even handed straight to MERGE, a seen record changes nothing
        let report = poll_loop
            .run_cycle(vec![record_at("D", 7, t0())])
            .await
            .unwrap();
        assert_eq!(report.new, 0);
        assert_eq!(report.total, 1);
        assert!(poll_loop.pending().is_empty());
        assert!(h.queue.is_empty());
        assert_eq!(poll_loop.handed_off(), 1);
    }

    #[tokio::test]
    async fn failed_lookup_keeps_records_for_next_cycle() {
        let h = Harness::new(5);
        h.stock(9, 4);
        h.stock(42, 4);
        h.inventory.fail_variant(VariantId::new(9));
        let mut poll_loop = h.poll_loop();

        let report = poll_loop
            .run_cycle(vec![record("x", 9), record("a", 42)])
            .await
            .unwrap();
        assert_eq!(h.queued_ids(), vec!["a"]);
        assert_eq!(ids(poll_loop.pending().get(VariantId::new(9))), vec!["x"]);
        assert_eq!(report.lookup_failures, 1);
        assert_eq!(report.out_of_stock, 0);

        h.inventory.recover_variant(VariantId::new(9));
        let report = poll_loop.run_cycle(Vec::new()).await.unwrap();
        assert_eq!(h.queued_ids(), vec!["x"]);
        assert!(poll_loop.pending().is_empty());
        assert_eq!(report.lookup_failures, 0);
    }

    #[tokio::test]
    async fn sent_counts_jobs_the_consumer_has_taken() {
        let h = Harness::new(5);
        h.stock(42, 3);
        h.stock(7, 0);
        let mut poll_loop = h.poll_loop();

        poll_loop
            .run_cycle(vec![
                record("a", 42),
                record("b", 42),
                record("c", 42),
                record("z", 7),
            ])
            .await
            .unwrap();
        h.queue.try_pop().unwrap();

        let report = poll_loop.run_cycle(Vec::new()).await.unwrap();
        assert_eq!(
            report,
            CycleReport {
                cycle: 2,
                new: 0,
                total: 4,
                sent: 1,
                unsent: 3,
                queued: 2,
                out_of_stock: 1,
                lookup_failures: 0,
            }
        );
    }

    #[tokio::test]
    async fn restock_after_merge_starts_a_fresh_list() {
        let h = Harness::new(5);
        h.stock(42, 1);
        let mut poll_loop = h.poll_loop();

        poll_loop.run_cycle(vec![record("a", 42)]).await.unwrap();
        h.inventory.set_quantity(VariantId::new(42), 0);
        poll_loop.run_cycle(vec![record("b", 42)]).await.unwrap();

        assert_eq!(ids(poll_loop.pending().get(VariantId::new(42))), vec!["b"]);
        assert_eq!(h.queued_ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure_without_dropping() {
        let h = Harness::new(1);
        h.stock(42, 10);
        let mut poll_loop = h.poll_loop();

        let consumer = std::thread::spawn({
            let queue = h.queue.clone();
            move || {
                let mut taken = Vec::new();
                for _ in 0..4 {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    assert!(queue.len() <= 1);
                    taken.push(queue.pop_blocking().notification.id.to_string());
                }
                taken
            }
        });

        poll_loop
            .run_cycle(vec![
                record("a", 42),
                record("b", 42),
                record("c", 42),
                record("d", 42),
            ])
            .await
            .unwrap();

        assert_eq!(consumer.join().unwrap(), vec!["a", "b", "c", "d"]);
        assert_eq!(poll_loop.handed_off(), 4);
    }

    #[tokio::test]
    async fn cursor_follows_server_time_even_without_new_records() {
        let h = Harness::new(5);
        let mut poll_loop = h.poll_loop();

        poll_loop.fetch_initial().await.unwrap();
        assert_eq!(poll_loop.cursor(), Some(t0()));

        h.clock.set(at(60));
        let delta = poll_loop.fetch_delta().await.unwrap();
        assert!(delta.is_empty());
        assert_eq!(poll_loop.cursor(), Some(at(60)));
        assert_eq!(poll_loop.phase(), Phase::FetchDelta);
    }

    #[tokio::test]
    async fn delta_returns_only_records_created_since_cursor() {
        let h = Harness::new(5);
        h.source.insert(record_at("old", 1, t0()));
        let mut poll_loop = h.poll_loop();
        let initial = poll_loop.fetch_initial().await.unwrap();
        poll_loop.merge(initial);

        h.clock.set(at(60));
        h.source.insert(record_at("new", 1, at(30)));
        let delta = poll_loop.fetch_delta().await.unwrap();
        assert_eq!(ids(&delta), vec!["new"]);
    }

    #[tokio::test]
    async fn restart_picks_up_records_left_pending() {
        let h = Harness::new(5);
        h.stock(7, 0);
        h.source.insert(record_at("a", 7, t0()));

        let mut first = h.poll_loop();
        let initial = first.fetch_initial().await.unwrap();
        first.run_cycle(initial).await.unwrap();
        assert_eq!(first.pending().pending_for(VariantId::new(7)), 1);
        drop(first);

        h.clock.set(at(60));
        h.inventory.set_quantity(VariantId::new(7), 5);
        let mut second = h.poll_loop();
        let initial = second.fetch_initial().await.unwrap();
        assert_eq!(ids(&initial), vec!["a"]);
        second.run_cycle(initial).await.unwrap();

        let delta = second.fetch_delta().await.unwrap();
        second.run_cycle(delta).await.unwrap();
        assert_eq!(h.queued_ids(), vec!["a"]);
        assert_eq!(second.handed_off(), 1);
    }

    #[tokio::test]
    async fn transient_fetch_failures_are_retried() {
        let h = Harness::new(5);
        h.source.insert(record("a", 1));
        h.source.fail_next(2);
        let mut poll_loop = h
            .builder()
            .fetch_retry(RetryPolicy::new(3, Duration::ZERO, 2.0))
            .build()
            .unwrap();

        let initial = poll_loop.fetch_initial().await.unwrap();
        assert_eq!(ids(&initial), vec!["a"]);
        assert_eq!(h.source.fetch_count(), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_keep_last_good_cursor() {
        let h = Harness::new(5);
        let mut poll_loop = h
            .builder()
            .fetch_retry(RetryPolicy::new(2, Duration::ZERO, 2.0))
            .build()
            .unwrap();
        poll_loop.fetch_initial().await.unwrap();

        h.clock.set(at(60));
        h.source.fail_next(5);
        let err = poll_loop.fetch_delta().await.unwrap_err();
        match err {
            PollError::SourceExhausted {
                attempts,
                cursor,
                source,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(cursor, Some(t0()));
                assert!(matches!(source, SourceError::Unreachable(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(poll_loop.cursor(), Some(t0()));
    }

    #[tokio::test]
    async fn run_terminates_when_source_stays_down() {
        let h = Harness::new(5);
        h.source.fail_next(10);

        let result = h.poll_loop().run().await;
        assert!(matches!(
            result,
            Err(PollError::SourceExhausted {
                attempts: 1,
                cursor: None,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn run_loops_until_the_source_fails() {
        let h = Harness::new(5);
        h.stock(42, 1);
        h.source.insert(record("a", 42));
        let source = h.source.clone();

        // initial fetch and three delta fetches succeed, then the source goes down
        let watcher = tokio::spawn(async move {
            while source.fetch_count() < 4 {
                tokio::task::yield_now().await;
            }
            source.fail_next(u32::MAX);
        });

        let poll_loop = h
            .builder()
            .refresh_interval(Duration::from_millis(5))
            .build()
            .unwrap();
        let result = poll_loop.run().await;
        watcher.await.unwrap();
        assert!(matches!(result, Err(PollError::SourceExhausted { .. })));
        assert!(h.source.fetch_count() >= 5);
        assert_eq!(h.queued_ids(), vec!["a"]);
    }
}
