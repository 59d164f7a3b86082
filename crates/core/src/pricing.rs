use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::event::EventId;
use crate::domain::item::ItemId;
use crate::errors::ApplicationError;
use crate::item_config::{load_item_config, PricingConfig};
use crate::session::{set_price, Session};
use crate::settings::SettingsStore;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PriceRejection {
    #[error("Invalid price format")]
    Malformed { raw: String },
    #[error("Price cannot be negative")]
    Negative { proposed: Decimal },
    #[error("The price must be at least {minimum}.")]
    BelowMinimum { proposed: Decimal, minimum: Decimal },
}

/// Accepts `proposed` iff it is non-negative and not below `min_amount`.
pub fn validate_price(
    proposed: Decimal,
    min_amount: Option<Decimal>,
) -> Result<Decimal, PriceRejection> {
    if proposed < Decimal::ZERO {
        return Err(PriceRejection::Negative { proposed });
    }

    if let Some(minimum) = min_amount {
        if proposed < minimum {
            return Err(PriceRejection::BelowMinimum { proposed, minimum });
        }
    }

    Ok(proposed)
}

/// Parses a customer-entered amount. Plain and scientific notation are accepted.
///
/// Input that `Decimal` cannot hold exactly is malformed; rounding it could move a
/// price across the item's minimum.
pub fn parse_price(raw: &str) -> Result<Decimal, PriceRejection> {
    let trimmed = raw.trim();
    let parsed = match trimmed.split_once(['e', 'E']) {
        None => parse_exact(trimmed),
        Some((mantissa, exponent)) => parse_exact(mantissa)
            .zip(exponent.parse::<i32>().ok())
            .and_then(|(mantissa, exponent)| shift_exact(mantissa, exponent)),
    };
    parsed.ok_or_else(|| PriceRejection::Malformed { raw: raw.to_string() })
}

fn parse_exact(plain: &str) -> Option<Decimal> {
    let value = Decimal::from_str(plain).ok()?;
    (value.abs().normalize().to_string() == canonical_digits(plain)).then_some(value)
}

/// `plain` without sign, digit separators, leading integer zeros or trailing fraction zeros.
fn canonical_digits(plain: &str) -> String {
    let unsigned = plain.trim_start_matches(['+', '-']).replace('_', "");
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned.as_str(), ""));
    let integer = integer.trim_start_matches('0');
    let fraction = fraction.trim_end_matches('0');

    match (integer.is_empty(), fraction.is_empty()) {
        (true, true) => "0".to_string(),
        (true, false) => format!("0.{fraction}"),
        (false, true) => integer.to_string(),
        (false, false) => format!("{integer}.{fraction}"),
    }
}

/// `mantissa * 10^exponent`, or `None` when the result would need rounding.
fn shift_exact(mantissa: Decimal, exponent: i32) -> Option<Decimal> {
    let mut value = mantissa.normalize();
    if exponent < 0 {
        let scale = value.scale().checked_add(exponent.unsigned_abs())?;
        value.set_scale(scale).ok()?;
        return Some(value);
    }
    for _ in 0..exponent {
        value = value.checked_mul(Decimal::TEN)?;
    }
    Some(value)
}

/// Presentation of the customer price input for one item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceField {
    pub label: String,
    pub help_text: Option<String>,
    pub min_value: Decimal,
    pub initial: Option<Decimal>,
    pub step: Decimal,
}

impl PriceField {
    pub fn for_config(config: &PricingConfig) -> Self {
        let label = match config.suggested_amount {
            Some(suggested) => format!("Choose your price (suggested: {suggested})"),
            None => "Choose your price".to_string(),
        };
        let help_text = config.min_amount.map(|minimum| format!("Minimum price: {minimum}"));

        Self {
            label,
            help_text,
            min_value: config.min_amount.unwrap_or(Decimal::ZERO),
            initial: config.suggested_amount,
            step: Decimal::new(1, 2),
        }
    }
}

/// Validates a submitted price for `item` and stores it in the session.
///
/// The item's minimum applies when the item is pricing-enabled. Rejected prices
/// never reach the session.
pub fn submit_price(
    store: &dyn SettingsStore,
    session: &mut dyn Session,
    event: &EventId,
    item: ItemId,
    raw_price: &str,
) -> Result<Decimal, ApplicationError> {
    let proposed = parse_price(raw_price)?;
    let config = load_item_config(store, event, item)?;
    let minimum = if config.enabled { config.min_amount } else { None };

    let price = match validate_price(proposed, minimum) {
        Ok(price) => price,
        Err(rejection) => {
            warn!(
                event_name = "pwyc.price.rejected",
                event_id = %event,
                item_id = %item,
                proposed = %proposed,
                reason = %rejection,
                "customer price rejected"
            );
            return Err(rejection.into());
        }
    };

    set_price(session, item, price);
    info!(
        event_name = "pwyc.price.selected",
        event_id = %event,
        item_id = %item,
        price = %price,
        "custom price stored in session"
    );
    Ok(price)
}
