//! Domain identifiers (strongly-typed IDs).
//!
//! 通知 ID は Notification Store が払い出す不透明な文字列、
//! variant / product ID はカタログ側の整数 ID。
//! newtype にしておくことで、VariantId と ProductId を取り違えるとコンパイルエラーになる。

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a "notify me" record, as assigned by the Notification Store.
///
/// This is the canonical dedup key: both the initial full load and every
/// delta fetch are deduplicated on this value and nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(String);

impl NotificationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NotificationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NotificationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a purchasable variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(i64);

impl VariantId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "variant-{}", self.0)
    }
}

/// Identity of a product (the parent of one or more variants).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(i64);

impl ProductId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "product-{}", self.0)
    }
}
