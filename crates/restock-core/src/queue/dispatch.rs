//! DispatchQueue - 有界のブロッキング配送キュー
//!
//! # 実装詳細
//! - Mutex<VecDeque<EmailJob>> で排他制御
//! - Condvar を2本（not_full / not_empty）使い、満杯なら push が、空なら pop が待つ
//! - async 側からは spawn_blocking 経由で呼ぶ（async context で Condvar を待たないため）
//!
//! producer は poll loop 1本、consumer は外部の Email Sender 1本という前提。

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::domain::EmailJob;
use crate::error::QueueError;

struct Shared {
    jobs: Mutex<VecDeque<EmailJob>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<EmailJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for room, append. Returns with the lock held.
    fn push_locked<'a>(
        &'a self,
        mut guard: MutexGuard<'a, VecDeque<EmailJob>>,
        job: EmailJob,
    ) -> MutexGuard<'a, VecDeque<EmailJob>> {
        while guard.len() >= self.capacity {
            guard = self
                .not_full
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
        guard.push_back(job);
        self.not_empty.notify_one();
        guard
    }

    fn push(&self, job: EmailJob) {
        let guard = self.lock();
        drop(self.push_locked(guard, job));
    }

    fn push_all(&self, jobs: Vec<EmailJob>) {
        let mut guard = self.lock();
        for job in jobs {
            guard = self.push_locked(guard, job);
        }
    }

    fn pop(&self) -> EmailJob {
        let mut guard = self.lock();
        loop {
            if let Some(job) = guard.pop_front() {
                self.not_full.notify_one();
                return job;
            }
            guard = self
                .not_empty
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn pop_timeout(&self, timeout: Duration) -> Option<EmailJob> {
        let start = Instant::now();
        let mut guard = self.lock();
        loop {
            if let Some(job) = guard.pop_front() {
                self.not_full.notify_one();
                return Some(job);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return None;
            }
            let (new_guard, _) = self
                .not_empty
                .wait_timeout(guard, timeout - elapsed)
                .unwrap_or_else(PoisonError::into_inner);
            guard = new_guard;
        }
    }
}

/// Bounded, ordered, thread-safe queue of [`EmailJob`]s.
///
/// - `push` never drops: while the queue holds `capacity` jobs it waits for
///   the consumer to make room.
/// - `pop` waits while the queue is empty.
/// - Jobs come out in the order they went in.
///
/// Cloning yields another handle to the same queue.
///
/// # 使用例
/// ```ignore
/// let queue = DispatchQueue::new(5)?;
/// queue.push(job).await?;
/// let job = queue.pop().await?;
/// ```
#[derive(Clone)]
pub struct DispatchQueue {
    shared: Arc<Shared>,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self {
            shared: Arc::new(Shared {
                jobs: Mutex::new(VecDeque::with_capacity(capacity)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Jobs currently waiting for the consumer.
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocking push for plain threads.
    pub fn push_blocking(&self, job: EmailJob) {
        self.shared.push(job);
    }

    /// Blocking pop for plain threads.
    pub fn pop_blocking(&self) -> EmailJob {
        self.shared.pop()
    }

    pub fn pop_timeout_blocking(&self, timeout: Duration) -> Option<EmailJob> {
        self.shared.pop_timeout(timeout)
    }

    pub fn try_pop(&self) -> Option<EmailJob> {
        self.shared.pop_timeout(Duration::ZERO)
    }

    pub async fn push(&self, job: EmailJob) -> Result<(), QueueError> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.push(job))
            .await
            .map_err(|e| QueueError::OperationFailed(format!("push failed: {e}")))
    }

    /// Push a batch in order, waiting for room as needed.
    pub async fn push_all(&self, jobs: Vec<EmailJob>) -> Result<(), QueueError> {
        if jobs.is_empty() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.push_all(jobs))
            .await
            .map_err(|e| QueueError::OperationFailed(format!("push failed: {e}")))
    }

    pub async fn pop(&self) -> Result<EmailJob, QueueError> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.pop())
            .await
            .map_err(|e| QueueError::OperationFailed(format!("pop failed: {e}")))
    }

    pub async fn pop_timeout(&self, timeout: Duration) -> Result<Option<EmailJob>, QueueError> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.pop_timeout(timeout))
            .await
            .map_err(|e| QueueError::OperationFailed(format!("pop failed: {e}")))
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}
