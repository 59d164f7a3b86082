use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::item::ItemId;

/// Metadata key holding the pre-override line price.
pub const ORIGINAL_PRICE_META_KEY: &str = "pwyc_original_price";

/// One product selection in an in-progress cart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    pub position_id: u64,
    pub item: ItemId,
    #[serde(default)]
    pub item_name: String,
    pub price: Decimal,
    #[serde(default)]
    pub meta_info: Map<String, Value>,
}

impl CartLine {
    pub fn new(position_id: u64, item: ItemId, price: Decimal) -> Self {
        Self { position_id, item, item_name: String::new(), price, meta_info: Map::new() }
    }

    pub fn with_item_name(mut self, name: impl Into<String>) -> Self {
        self.item_name = name.into();
        self
    }

    /// The item name, or a stable placeholder when the host did not supply one.
    pub fn display_name(&self) -> String {
        if self.item_name.is_empty() {
            format!("item:{}", self.item)
        } else {
            self.item_name.clone()
        }
    }

    pub fn original_price(&self) -> Option<&str> {
        self.meta_info.get(ORIGINAL_PRICE_META_KEY).and_then(Value::as_str)
    }
}

/// A fee line returned to the host's fee computation. This plugin never adds any.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub fee_type: String,
    pub value: Decimal,
    pub description: String,
}
