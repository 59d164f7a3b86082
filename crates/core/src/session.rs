use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::debug;

use crate::domain::item::ItemId;

const PRICE_KEY_PREFIX: &str = "price:";

/// Host-owned per-visitor key-value store.
pub trait Session {
    fn get(&self, key: &str) -> Option<String>;
    fn insert(&mut self, key: &str, value: String);
    /// Keys in the order the session first saw them.
    fn keys(&self) -> Vec<String>;
}

/// Insertion-ordered session. Overwriting a key keeps its original position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InMemorySession {
    entries: Vec<(String, String)>,
    modified: bool,
}

impl InMemorySession {
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }
}

impl Session for InMemorySession {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.iter().find(|(existing, _)| existing == key).map(|(_, value)| value.clone())
    }

    fn insert(&mut self, key: &str, value: String) {
        match self.entries.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
        self.modified = true;
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }
}

pub fn price_key(item: ItemId) -> String {
    format!("{PRICE_KEY_PREFIX}{item}")
}

pub fn set_price(session: &mut dyn Session, item: ItemId, price: Decimal) {
    session.insert(&price_key(item), price.to_string());
}

/// The chosen price for `item`, or `None` when absent or unparseable.
pub fn get_price(session: &dyn Session, item: ItemId) -> Option<Decimal> {
    let raw = session.get(&price_key(item))?;
    match Decimal::from_str(raw.trim()) {
        Ok(price) => Some(price),
        Err(error) => {
            debug!(
                event_name = "pwyc.session.malformed_price",
                item_id = %item,
                error = %error,
                "ignoring unparseable session price"
            );
            None
        }
    }
}

/// Every parseable chosen price, in session insertion order.
pub fn enumerate_prices(session: &dyn Session) -> Vec<(ItemId, Decimal)> {
    session
        .keys()
        .into_iter()
        .filter_map(|key| {
            let item = key.strip_prefix(PRICE_KEY_PREFIX)?.parse::<ItemId>().ok()?;
            get_price(session, item).map(|price| (item, price))
        })
        .collect()
}
