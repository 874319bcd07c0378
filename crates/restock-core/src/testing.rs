//! Shared fixtures for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::domain::{EmailJob, NotificationRecord, Product, ProductId, Variant, VariantId};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    t0() + Duration::seconds(secs)
}

pub(crate) fn record(id: &str, variant: i64) -> NotificationRecord {
    record_at(id, variant, t0())
}

pub(crate) fn record_at(id: &str, variant: i64, created_at: DateTime<Utc>) -> NotificationRecord {
    NotificationRecord::new(
        id,
        VariantId::new(variant),
        format!("{id}@example.com"),
        created_at,
    )
}

/// Product ids mirror variant ids in fixtures: variant 42 belongs to product 42.
pub(crate) fn product(variant: i64) -> Product {
    Product::new(ProductId::new(variant), format!("Product {variant}"))
}

pub(crate) fn variant(variant: i64, quantity: i64) -> Variant {
    Variant::new(VariantId::new(variant), ProductId::new(variant), quantity)
}

pub(crate) fn job(id: &str, variant_id: i64) -> EmailJob {
    EmailJob::new(product(variant_id), variant(variant_id, 1), record(id, variant_id))
}
