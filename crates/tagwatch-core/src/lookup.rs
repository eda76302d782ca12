// ── Registration lookup seam ──
//
// The classification pipeline resolves EPCs through `LookupService`.
// Production uses the HTTP `InventoryClient`; tests and the CLI's
// offline mode use `StaticCatalog`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use tagwatch_api::InventoryClient;

use crate::error::CoreError;
use crate::model::{Product, RegisteredItem};

/// Resolves EPCs and product ids against an inventory catalog.
pub trait LookupService: Send + Sync + 'static {
    /// `Ok(None)` means the EPC is not registered.
    fn lookup_item<'a>(&'a self, epc: &'a str)
    -> BoxFuture<'a, Result<Option<RegisteredItem>, CoreError>>;

    fn lookup_product<'a>(
        &'a self,
        product_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Product>, CoreError>>;

    fn list_products(&self) -> BoxFuture<'_, Result<Vec<Product>, CoreError>>;
}

// ── HTTP backend ─────────────────────────────────────────────────────

impl LookupService for InventoryClient {
    fn lookup_item<'a>(
        &'a self,
        epc: &'a str,
    ) -> BoxFuture<'a, Result<Option<RegisteredItem>, CoreError>> {
        Box::pin(async move { Ok(self.get_item_by_epc(epc).await?.map(Into::into)) })
    }

    fn lookup_product<'a>(
        &'a self,
        product_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Product>, CoreError>> {
        Box::pin(async move { Ok(self.get_product_by_id(product_id).await?.map(Into::into)) })
    }

    fn list_products(&self) -> BoxFuture<'_, Result<Vec<Product>, CoreError>> {
        Box::pin(async move {
            let products = InventoryClient::list_products(self).await?;
            Ok(products.into_iter().map(Into::into).collect())
        })
    }
}

// ── In-memory catalog ────────────────────────────────────────────────

/// A fixed catalog held in memory.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    /// EPC -> linked product id.
    items: HashMap<String, Option<String>>,
    products: IndexMap<String, Product>,
    latency: Option<Duration>,
    unreachable: bool,
    item_lookups: AtomicU32,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `epc` under `product_id`, creating a bare product if needed.
    #[must_use]
    pub fn with_item(mut self, epc: &str, product_id: &str) -> Self {
        self.items.insert(epc.to_string(), Some(product_id.to_string()));
        self.products
            .entry(product_id.to_string())
            .or_insert_with(|| Product {
                id: product_id.to_string(),
                description: None,
                attributes: BTreeMap::new(),
            });
        self
    }

    /// Register `epc` without a product link.
    #[must_use]
    pub fn with_unlinked_item(mut self, epc: &str) -> Self {
        self.items.insert(epc.to_string(), None);
        self
    }

    #[must_use]
    pub fn with_product(mut self, product: Product) -> Self {
        self.products.insert(product.id.clone(), product);
        self
    }

    /// Delay every answer by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail every lookup as if the backend were down.
    #[must_use]
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    /// Number of item lookups served so far.
    pub fn item_lookups(&self) -> u32 {
        self.item_lookups.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<(), CoreError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable {
            return Err(CoreError::Lookup {
                message: "catalog unreachable".into(),
                status: None,
            });
        }
        Ok(())
    }
}

impl LookupService for StaticCatalog {
    fn lookup_item<'a>(
        &'a self,
        epc: &'a str,
    ) -> BoxFuture<'a, Result<Option<RegisteredItem>, CoreError>> {
        Box::pin(async move {
            self.item_lookups.fetch_add(1, Ordering::SeqCst);
            self.respond().await?;
            Ok(self.items.get(epc).map(|product_id| RegisteredItem {
                epc: epc.to_string(),
                product_id: product_id.clone(),
            }))
        })
    }

    fn lookup_product<'a>(
        &'a self,
        product_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<Product>, CoreError>> {
        Box::pin(async move {
            self.respond().await?;
            Ok(self.products.get(product_id).cloned())
        })
    }

    fn list_products(&self) -> BoxFuture<'_, Result<Vec<Product>, CoreError>> {
        Box::pin(async move {
            self.respond().await?;
            Ok(self.products.values().cloned().collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_catalog_resolves_items() {
        let catalog = StaticCatalog::new()
            .with_item("E1", "SKU-1")
            .with_unlinked_item("E2");

        let item = catalog.lookup_item("E1").await.unwrap().unwrap();
        assert_eq!(item.product_id.as_deref(), Some("SKU-1"));
        let unlinked = catalog.lookup_item("E2").await.unwrap().unwrap();
        assert_eq!(unlinked.product_id, None);
        assert!(catalog.lookup_item("E3").await.unwrap().is_none());
        assert_eq!(catalog.item_lookups(), 3);
    }

    #[tokio::test]
    async fn unreachable_catalog_errors() {
        let catalog = StaticCatalog::new().with_item("E1", "SKU-1").unreachable();
        assert!(catalog.lookup_item("E1").await.is_err());
        assert!(catalog.list_products().await.is_err());
    }
}
