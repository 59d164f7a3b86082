use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domain::cart::{CartLine, ORIGINAL_PRICE_META_KEY};
use crate::domain::event::EventId;
use crate::domain::item::ItemId;
use crate::item_config::{load_item_config, PricingConfig};
use crate::pricing::validate_price;
use crate::session::{get_price, Session};
use crate::settings::SettingsStore;

/// What happened to one overridden line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedOverride {
    pub position_id: u64,
    pub item: ItemId,
    /// The stashed pre-override price, as stored in `meta_info`.
    pub original_price: String,
    pub custom_price: Decimal,
    /// `false` when an earlier pass already stashed the original price.
    pub first_application: bool,
}

/// Replaces line prices with session-chosen prices for pricing-enabled items.
///
/// The original price is stashed once; re-running over the same lines yields the
/// same prices and metadata. Lines without a usable session price, lines whose item
/// cannot be read from the store, and lines whose stored price no longer satisfies
/// the item's minimum keep their normal price.
pub fn apply_price_overrides(
    store: &dyn SettingsStore,
    event: &EventId,
    lines: &mut [CartLine],
    session: Option<&dyn Session>,
) -> Vec<AppliedOverride> {
    let Some(session) = session else {
        debug!(
            event_name = "pwyc.cart.no_session",
            event_id = %event,
            "no session available, leaving cart prices untouched"
        );
        return Vec::new();
    };

    let mut configs: HashMap<ItemId, Option<PricingConfig>> = HashMap::new();
    let mut applied = Vec::new();

    for line in lines.iter_mut() {
        let Some(custom_price) = get_price(session, line.item) else {
            continue;
        };

        let config = configs
            .entry(line.item)
            .or_insert_with(|| match load_item_config(store, event, line.item) {
                Ok(config) => Some(config),
                Err(error) => {
                    warn!(
                        event_name = "pwyc.cart.settings_unavailable",
                        event_id = %event,
                        item_id = %line.item,
                        error = %error,
                        "skipping price override"
                    );
                    None
                }
            });
        let Some(config) = config.as_ref().filter(|config| config.enabled) else {
            continue;
        };

        if let Err(rejection) = validate_price(custom_price, config.min_amount) {
            warn!(
                event_name = "pwyc.cart.stale_price",
                event_id = %event,
                item_id = %line.item,
                price = %custom_price,
                reason = %rejection,
                "session price no longer acceptable, keeping regular price"
            );
            continue;
        }

        let first_application = line.original_price().is_none();
        if first_application {
            line.meta_info
                .insert(ORIGINAL_PRICE_META_KEY.to_string(), Value::String(line.price.to_string()));
        }
        let original_price =
            line.original_price().map(str::to_string).unwrap_or_else(|| line.price.to_string());
        line.price = custom_price;

        if first_application {
            info!(
                event_name = "pwyc.cart.price_overridden",
                event_id = %event,
                item_id = %line.item,
                position_id = line.position_id,
                original_price = %original_price,
                price = %custom_price,
                "cart line price replaced with customer choice"
            );
        }

        applied.push(AppliedOverride {
            position_id: line.position_id,
            item: line.item,
            original_price,
            custom_price,
            first_application,
        });
    }

    applied
}
