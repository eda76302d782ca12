// ── API-to-domain type conversions ──
//
// Bridges raw `tagwatch_api` response types into the canonical domain
// types in `crate::model`.

use std::collections::BTreeMap;

use tagwatch_api::{ItemResponse, ProductResponse};

use crate::model::{Product, RegisteredItem};

impl From<ItemResponse> for RegisteredItem {
    fn from(item: ItemResponse) -> Self {
        RegisteredItem {
            epc: item.item_id,
            product_id: item.item_product_id.filter(|id| !id.trim().is_empty()),
        }
    }
}

impl From<ProductResponse> for Product {
    fn from(p: ProductResponse) -> Self {
        let attributes: BTreeMap<String, String> = [
            ("fld02", p.fld02),
            ("fld03", p.fld03),
            ("fldd01", p.fldd01),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect();

        Product {
            id: p.product_id,
            description: p.fld01,
            attributes,
        }
    }
}
