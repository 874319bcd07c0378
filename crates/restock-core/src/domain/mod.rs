//! Domain model (IDs, notification records, catalog snapshots, email jobs).
//!
//! - ids: NotificationId / VariantId / ProductId
//! - notification: NotificationRecord, NotificationBatch（カーソル付きの取得結果）
//! - catalog: Variant, Product
//! - email: EmailJob, EmailMessage

pub mod catalog;
pub mod email;
pub mod ids;
pub mod notification;

pub use catalog::{Product, Variant};
pub use email::{EmailJob, EmailMessage};
pub use ids::{NotificationId, ProductId, VariantId};
pub use notification::{NotificationBatch, NotificationRecord};
