// Inventory backend HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, status mapping, and
// body decoding. Item and product lookups treat HTTP 404 as a regular
// "not found" answer rather than an error.

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{ErrorBody, ItemResponse, ProductResponse};
use crate::transport::TransportConfig;

/// Raw HTTP client for the inventory/product backend.
///
/// Cheaply cloneable: `reqwest::Client` is reference-counted internally.
#[derive(Debug, Clone)]
pub struct InventoryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl InventoryClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the API root, e.g. `https://inventory.local/api/`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: normalize_base(base_url),
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Resolve an EPC to its registered inventory item.
    ///
    /// `GET /items/epc/{epc}` -- returns `Ok(None)` when the backend
    /// answers 404 (the tag is not registered).
    pub async fn get_item_by_epc(&self, epc: &str) -> Result<Option<ItemResponse>, Error> {
        let url = self.endpoint(&["items", "epc", epc])?;
        self.get_optional(url).await
    }

    /// Fetch a product record by id.
    ///
    /// `GET /products/{id}` -- `Ok(None)` on 404.
    pub async fn get_product_by_id(
        &self,
        product_id: &str,
    ) -> Result<Option<ProductResponse>, Error> {
        let url = self.endpoint(&["products", product_id])?;
        self.get_optional(url).await
    }

    /// List every product in the catalog.
    ///
    /// `GET /products`
    pub async fn list_products(&self) -> Result<Vec<ProductResponse>, Error> {
        let url = self.endpoint(&["products"])?;
        Ok(self.get_optional(url).await?.unwrap_or_default())
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Append `segments` to the base URL, percent-encoding each one so
    /// ids containing `/`, `#` or `?` stay inside their own segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a GET request and decode the body, mapping 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await?;
        let status = resp.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized);
        }

        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| body.chars().take(200).collect());
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map(Some).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}

/// Keep the base path ending in `/` so it reads as a directory.
fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
