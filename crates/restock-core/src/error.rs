use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{NotificationId, ProductId, VariantId};

/// Failure talking to the Notification Source.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("notification source unreachable: {0}")]
    Unreachable(String),

    #[error("invalid response from notification source: {0}")]
    InvalidResponse(String),

    #[error("notification {0} not found in store")]
    NotFound(NotificationId),
}

/// Failure looking up one variant (or its product).
///
/// Scoped to a single variant: the detector records it and moves on.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{0} not found")]
    VariantNotFound(VariantId),

    #[error("{product} for {variant} not found")]
    ProductNotFound {
        variant: VariantId,
        product: ProductId,
    },

    #[error("inventory service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("dispatch queue capacity must be at least 1")]
    ZeroCapacity,

    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("email transport rejected message to {to}: {reason}")]
    Rejected { to: String, reason: String },

    #[error("email transport unavailable: {0}")]
    Unavailable(String),
}

/// Errors that end the poll loop.
#[derive(Debug, Error)]
pub enum PollError {
    /// Fetch retries exhausted. `cursor` is the server time of the last
    /// successful fetch.
    #[error("notification source failed after {attempts} attempt(s) (last good cursor: {cursor:?})")]
    SourceExhausted {
        attempts: u32,
        cursor: Option<DateTime<Utc>>,
        #[source]
        source: SourceError,
    },

    #[error(transparent)]
    Queue(#[from] QueueError),
}
