//! Catalog snapshot resolution with a TTL cache.
//!
//! The cart joins its lines against these snapshots. Product reads are the
//! only place a missing record is tolerated: a line whose product no longer
//! resolves degrades to an unpriced line instead of failing the cart.

use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    api::CommerceApi, cache::InMemoryCache, errors::CheckoutError, models::ProductSnapshot,
};

const SNAPSHOT_KEY_PREFIX: &str = "product_snapshot:";

pub struct CatalogService {
    api: Arc<dyn CommerceApi>,
    cache: InMemoryCache,
    snapshot_ttl: Duration,
}

impl CatalogService {
    pub fn new(api: Arc<dyn CommerceApi>, snapshot_ttl: Duration) -> Self {
        Self {
            api,
            cache: InMemoryCache::new(),
            snapshot_ttl,
        }
    }

    fn cache_key(id: Uuid) -> String {
        format!("{}{}", SNAPSHOT_KEY_PREFIX, id)
    }

    async fn store(&self, snapshot: &ProductSnapshot) -> Result<(), CheckoutError> {
        let data = serde_json::to_string(snapshot)
            .map_err(|e| CheckoutError::Serialization(e.to_string()))?;
        self.cache
            .set(&Self::cache_key(snapshot.id), &data, Some(self.snapshot_ttl))
            .await?;
        Ok(())
    }

    /// Resolves one product snapshot, from cache when fresh.
    ///
    /// Returns `Ok(None)` when the authority no longer knows the product, so
    /// callers can exclude the line instead of failing.
    #[instrument(skip(self))]
    pub async fn product(&self, id: Uuid) -> Result<Option<ProductSnapshot>, CheckoutError> {
        if let Some(data) = self.cache.get(&Self::cache_key(id)).await? {
            let snapshot: ProductSnapshot = serde_json::from_str(&data)
                .map_err(|e| CheckoutError::Serialization(e.to_string()))?;
            return Ok(Some(snapshot));
        }

        match self.api.get_product(id).await {
            Ok(snapshot) => {
                self.store(&snapshot).await?;
                Ok(Some(snapshot))
            }
            Err(CheckoutError::Api { status, .. }) if status == StatusCode::NOT_FOUND => {
                debug!(product_id = %id, "product no longer resolves");
                Ok(None)
            }
            Err(CheckoutError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Lists the catalog and warms the snapshot cache.
    #[instrument(skip(self))]
    pub async fn products(&self) -> Result<Vec<ProductSnapshot>, CheckoutError> {
        let products = self.api.list_products().await?;
        for snapshot in &products {
            self.store(snapshot).await?;
        }
        Ok(products)
    }

    /// Drops every cached snapshot. Called after a verified payment, when
    /// stock figures may have changed.
    pub async fn invalidate(&self) -> Result<(), CheckoutError> {
        self.cache.clear().await?;
        Ok(())
    }
}
