//! NotificationSource port - Notification Store へのアクセス
//!
//! 作成・削除は Notification Store の責務。このクレートは読み取りと、
//! 送信後の送信済みフラグ更新だけを行う。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{NotificationBatch, NotificationId};
use crate::error::SourceError;

/// Read access to stored "notify me" records.
///
/// Both calls return the server's `as_of` timestamp alongside the records;
/// the poll loop uses it as the cursor for the next `fetch_since`.
#[async_trait]
pub trait NotificationSource: Send + Sync {
    /// Every record not yet marked sent.
    async fn fetch_all_unsent(&self) -> Result<NotificationBatch, SourceError>;

    /// Records created at or after `since`.
    ///
    /// Overlap with earlier batches is allowed; the caller deduplicates.
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<NotificationBatch, SourceError>;

    /// Flag a record as sent so later `fetch_all_unsent` calls skip it.
    async fn mark_sent(
        &self,
        id: &NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<(), SourceError>;
}
