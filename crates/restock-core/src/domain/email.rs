//! EmailJob: the unit placed on the dispatch queue.

use serde::{Deserialize, Serialize};

use super::catalog::{Product, Variant};
use super::notification::NotificationRecord;

/// (Product, Variant, NotificationRecord) for one fulfillable request.
///
/// Every job drained from the same variant in one cycle shares the same
/// `Product` and `Variant` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub product: Product,
    pub variant: Variant,
    pub notification: NotificationRecord,
}

impl EmailJob {
    pub fn new(product: Product, variant: Variant, notification: NotificationRecord) -> Self {
        Self {
            product,
            variant,
            notification,
        }
    }

    /// Render the message the sender should deliver.
    pub fn compose(&self) -> EmailMessage {
        let item = if self.variant.title.is_empty() {
            self.product.title.clone()
        } else {
            format!("{} ({})", self.product.title, self.variant.title)
        };

        let mut body = format!("Good news! {item} is back in stock.\n");
        if !self.product.handle.is_empty() {
            body.push_str(&format!("\nShop now: /products/{}\n", self.product.handle));
        }
        body.push_str("\nYou are receiving this email because you asked to be notified when this item became available.\n");

        EmailMessage {
            to: self.notification.email.clone(),
            subject: format!("{item} is back in stock"),
            body,
        }
    }
}

/// A rendered email, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}
