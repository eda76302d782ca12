// ── Tag domain types ──
//
// Observations held in the tag store, the registration data resolved
// from the inventory backend, and the classification decisions cached
// per EPC.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::Instant;

/// Display marker for tags without a backend registration.
pub const UNREGISTERED_LABEL: &str = "UNREGISTERED";

/// A single read delivered by the reader driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRead {
    pub epc: String,
    /// Peak RSSI in dBm.
    pub rssi: i32,
}

impl RawRead {
    pub fn new(epc: impl Into<String>, rssi: i32) -> Self {
        Self {
            epc: epc.into(),
            rssi,
        }
    }
}

/// A product record from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: String,
    pub description: Option<String>,
    /// Remaining catalog attributes, keyed by backend field name.
    pub attributes: BTreeMap<String, String>,
}

impl Product {
    /// `"{id} - {description}"`, or just the id.
    pub fn label(&self) -> String {
        match self.description.as_deref() {
            Some(desc) if !desc.trim().is_empty() => format!("{} - {desc}", self.id),
            _ => self.id.clone(),
        }
    }
}

/// An inventory item linked to an EPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisteredItem {
    pub epc: String,
    pub product_id: Option<String>,
}

/// The outcome of resolving an EPC against the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Registration {
    /// The EPC is linked to an inventory item.
    Registered {
        product_id: Option<String>,
        /// Product details, fetched only for accepted tags.
        product: Option<Product>,
    },
    /// No registration found (or the lookup failed).
    Unregistered,
}

impl Registration {
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered { .. })
    }

    pub fn product_id(&self) -> Option<&str> {
        match self {
            Self::Registered { product_id, .. } => product_id.as_deref(),
            Self::Unregistered => None,
        }
    }

    pub fn product(&self) -> Option<&Product> {
        match self {
            Self::Registered { product, .. } => product.as_ref(),
            Self::Unregistered => None,
        }
    }

    /// Short text for list rows: product label, product id, or the
    /// unregistered marker.
    pub fn label(&self) -> String {
        match self {
            Self::Registered {
                product: Some(product),
                ..
            } => product.label(),
            Self::Registered {
                product_id: Some(id),
                product: None,
            } => id.clone(),
            Self::Registered {
                product_id: None,
                product: None,
            } => "-".into(),
            Self::Unregistered => UNREGISTERED_LABEL.into(),
        }
    }
}

/// Cached accept/reject verdict for one EPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationDecision {
    pub epc: String,
    pub matched: bool,
    pub registration: Registration,
}

/// Latest known state of one tag.
///
/// Exactly one observation exists per EPC in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagObservation {
    pub epc: String,
    pub rssi: i32,
    /// Monotonic time of the last accepted read.
    #[serde(skip)]
    pub last_seen: Instant,
    /// Wall-clock time of the last accepted read.
    pub seen_at: DateTime<Utc>,
    pub selected: bool,
    pub registration: Registration,
}
