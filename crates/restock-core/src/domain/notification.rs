//! Notification record: a requester waiting on one variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{NotificationId, VariantId};

/// A "notify me when this is back in stock" request.
///
/// Produced by the Notification Store and never mutated here: the core only
/// classifies it (pending / ready) and forwards it inside an `EmailJob`.
///
/// Field names on the wire follow the record store (`variantId`,
/// `createdDate`, `isSent`, `sentDate`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: NotificationId,
    pub variant_id: VariantId,
    pub email: String,
    #[serde(rename = "createdDate")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "isSent", default)]
    pub sent: bool,
    #[serde(rename = "sentDate", default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl NotificationRecord {
    /// Create an unsent record.
    pub fn new(
        id: impl Into<NotificationId>,
        variant_id: VariantId,
        email: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            variant_id,
            email: email.into(),
            created_at,
            sent: false,
            sent_at: None,
        }
    }
}

/// One response from the Notification Source.
///
/// `as_of` is the server's own clock at the time of the query; it becomes
/// the cursor for the next delta fetch whether or not `records` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationBatch {
    #[serde(rename = "notifications")]
    pub records: Vec<NotificationRecord>,
    #[serde(rename = "currentDate")]
    pub as_of: DateTime<Utc>,
}

impl NotificationBatch {
    pub fn new(records: Vec<NotificationRecord>, as_of: DateTime<Utc>) -> Self {
        Self { records, as_of }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deserializes_record_store_shape() {
        let json = serde_json::json!({
            "id": "59be3c34b1a24167ad2779b5",
            "variantId": 42,
            "email": "someone@example.com",
            "createdDate": "2024-01-01T12:00:00Z",
            "isSent": false
        });

        let record: NotificationRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.id.as_str(), "59be3c34b1a24167ad2779b5");
        assert_eq!(record.variant_id, VariantId::new(42));
        assert_eq!(
            record.created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
        );
        assert!(!record.sent);
        assert_eq!(record.sent_at, None);
    }

    #[test]
    fn batch_uses_current_date_as_cursor_field() {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let v = serde_json::to_value(NotificationBatch::new(Vec::new(), as_of)).unwrap();
        assert_eq!(v["currentDate"], "2024-03-01T00:00:00Z");
        assert!(v["notifications"].as_array().unwrap().is_empty());
    }
}
