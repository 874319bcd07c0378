//! FixtureBackend - JSON ファイルを source of truth とする開発用バックエンド
//!
//! 呼び出しのたびにファイルを読み直すので、実行中にファイルを編集すれば
//! 新しい通知の追加や在庫の復活をそのまま再現できる。
//! mark_sent は一時ファイルに書いてから rename で置き換える。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    NotificationBatch, NotificationId, NotificationRecord, Product, Variant, VariantId,
};
use crate::error::{InventoryError, SourceError};
use crate::ports::{Clock, InventoryService, NotificationSource};

/// On-disk shape of the fixture.
///
/// ```json
/// {
///   "notifications": [{"id": "n1", "variantId": 42, "email": "a@example.com",
///                      "createdDate": "2024-01-01T00:00:00Z", "isSent": false}],
///   "variants": [{"id": 42, "product_id": 1, "title": "Large", "inventory_quantity": 0}],
///   "products": [{"id": 1, "title": "Wool Socks", "handle": "wool-socks"}]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureFile {
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Serves both ports from one JSON file.
pub struct FixtureBackend {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FixtureBackend {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<FixtureFile, LoadError> {
        let bytes = tokio::fs::read(&self.path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn store(&self, fixture: &FixtureFile) -> Result<(), LoadError> {
        let bytes = serde_json::to_vec_pretty(fixture)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn source_error(&self, e: LoadError) -> SourceError {
        match e {
            LoadError::Io(_) => SourceError::Unreachable(format!("{}: {e}", self.path.display())),
            LoadError::Parse(_) => {
                SourceError::InvalidResponse(format!("{}: {e}", self.path.display()))
            }
        }
    }

    async fn unsent_where(
        &self,
        filter: impl Fn(&NotificationRecord) -> bool + Send,
    ) -> Result<NotificationBatch, SourceError> {
        let as_of = self.clock.now();
        let fixture = self.load().await.map_err(|e| self.source_error(e))?;
        let records = fixture
            .notifications
            .into_iter()
            .filter(|r| !r.sent && filter(r))
            .collect();
        Ok(NotificationBatch::new(records, as_of))
    }

    async fn catalog(&self) -> Result<FixtureFile, InventoryError> {
        self.load()
            .await
            .map_err(|e| InventoryError::Unavailable(format!("{}: {e}", self.path.display())))
    }
}

#[async_trait]
impl NotificationSource for FixtureBackend {
    async fn fetch_all_unsent(&self) -> Result<NotificationBatch, SourceError> {
        self.unsent_where(|_| true).await
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<NotificationBatch, SourceError> {
        self.unsent_where(move |r| r.created_at >= since).await
    }

    async fn mark_sent(
        &self,
        id: &NotificationId,
        sent_at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        let mut fixture = self.load().await.map_err(|e| self.source_error(e))?;
        let record = fixture
            .notifications
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| SourceError::NotFound(id.clone()))?;
        record.sent = true;
        record.sent_at = Some(sent_at);
        self.store(&fixture).await.map_err(|e| self.source_error(e))
    }
}

#[async_trait]
impl InventoryService for FixtureBackend {
    async fn get_variant(&self, variant_id: VariantId) -> Result<Variant, InventoryError> {
        self.catalog()
            .await?
            .variants
            .into_iter()
            .find(|v| v.id == variant_id)
            .ok_or(InventoryError::VariantNotFound(variant_id))
    }

    async fn get_product(&self, variant: &Variant) -> Result<Product, InventoryError> {
        self.catalog()
            .await?
            .products
            .into_iter()
            .find(|p| p.id == variant.product_id)
            .ok_or(InventoryError::ProductNotFound {
                variant: variant.id,
                product: variant.product_id,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::testing::{at, product, record_at, variant};

    fn write_fixture(name: &str, fixture: &FixtureFile) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "restock-fixture-{}-{name}.json",
            std::process::id()
        ));
        std::fs::write(&path, serde_json::to_vec(fixture).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn serves_notifications_and_catalog_from_file() {
        let fixture = FixtureFile {
            notifications: vec![record_at("a", 42, at(0)), record_at("b", 42, at(30))],
            variants: vec![variant(42, 3)],
            products: vec![product(42)],
        };
        let path = write_fixture("serves", &fixture);
        let backend = FixtureBackend::new(&path, Arc::new(FixedClock::new(at(60))));

        let all = backend.fetch_all_unsent().await.unwrap();
        assert_eq!(all.records.len(), 2);
        assert_eq!(all.as_of, at(60));

        let delta = backend.fetch_since(at(30)).await.unwrap();
        assert_eq!(delta.records.len(), 1);
        assert_eq!(delta.records[0].id.as_str(), "b");

        let v = backend.get_variant(VariantId::new(42)).await.unwrap();
        assert!(v.is_in_stock());
        assert_eq!(backend.get_product(&v).await.unwrap(), product(42));
        assert!(matches!(
            backend.get_variant(VariantId::new(1)).await,
            Err(InventoryError::VariantNotFound(_))
        ));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn mark_sent_is_written_back_to_the_file() {
        let fixture = FixtureFile {
            notifications: vec![record_at("a", 42, at(0)), record_at("b", 42, at(10))],
            variants: vec![variant(42, 3)],
            products: vec![product(42)],
        };
        let path = write_fixture("mark-sent", &fixture);
        let backend = FixtureBackend::new(&path, Arc::new(FixedClock::new(at(60))));

        backend
            .mark_sent(&NotificationId::from("a"), at(30))
            .await
            .unwrap();

        let unsent = backend.fetch_all_unsent().await.unwrap();
        let ids: Vec<&str> = unsent.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b"]);

        let on_disk: FixtureFile = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(on_disk.notifications[0].sent);
        assert_eq!(on_disk.notifications[0].sent_at, Some(at(30)));
        assert_eq!(on_disk.variants, fixture.variants);

        assert!(matches!(
            backend.mark_sent(&NotificationId::from("ghost"), at(30)).await,
            Err(SourceError::NotFound(_))
        ));
        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn missing_or_broken_file_maps_to_source_errors() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at(0)));
        let missing = FixtureBackend::new("/nonexistent/restock.json", Arc::clone(&clock));
        assert!(matches!(
            missing.fetch_all_unsent().await,
            Err(SourceError::Unreachable(_))
        ));

        let path = std::env::temp_dir().join(format!(
            "restock-fixture-{}-broken.json",
            std::process::id()
        ));
        std::fs::write(&path, b"{ not json").unwrap();
        let broken = FixtureBackend::new(&path, clock);
        assert!(matches!(
            broken.fetch_all_unsent().await,
            Err(SourceError::InvalidResponse(_))
        ));
        std::fs::remove_file(path).ok();
    }
}
