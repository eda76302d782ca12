// Wire models for the inventory backend.
//
// Field names mirror the backend's JSON exactly; `tagwatch-core`
// converts these into its own domain types.

use serde::{Deserialize, Serialize};

/// An inventory item linked to an EPC.
///
/// `GET /items/epc/{epc}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResponse {
    /// The item identifier (the EPC itself for tag-backed items).
    pub item_id: String,
    /// The product this item is registered under, if any.
    #[serde(default)]
    pub item_product_id: Option<String>,
}

/// A product record.
///
/// `GET /products/{id}` and `GET /products`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductResponse {
    pub product_id: String,
    #[serde(default)]
    pub fld01: Option<String>,
    #[serde(default)]
    pub fld02: Option<String>,
    #[serde(default)]
    pub fld03: Option<String>,
    #[serde(default)]
    pub fldd01: Option<String>,
}

impl ProductResponse {
    /// Human-readable suggestion label: `"{id} - {fld01}"`, or just the id.
    pub fn label(&self) -> String {
        match self.fld01.as_deref() {
            Some(desc) if !desc.trim().is_empty() => format!("{} - {desc}", self.product_id),
            _ => self.product_id.clone(),
        }
    }
}

/// Error body shape returned by the backend on failures.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(alias = "detail", alias = "error")]
    pub message: Option<String>,
}
