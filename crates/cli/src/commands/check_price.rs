use pwyc_core::pricing::{parse_price, validate_price, PriceRejection};

use crate::commands::CommandResult;

const COMMAND: &str = "check-price";

/// Runs a customer-entered amount through the same parsing and minimum check the
/// storefront applies.
pub fn run(price: &str, min_amount: Option<&str>) -> CommandResult {
    let minimum = match min_amount.map(parse_price).transpose() {
        Ok(minimum) => minimum,
        Err(_) => {
            return CommandResult::failure(
                COMMAND,
                "invalid_argument",
                format!("--min `{}` is not a decimal amount", min_amount.unwrap_or_default()),
                2,
            );
        }
    };

    match parse_price(price).and_then(|proposed| validate_price(proposed, minimum)) {
        Ok(accepted) => CommandResult::success(COMMAND, format!("price {accepted} accepted")),
        Err(rejection) => {
            CommandResult::failure(COMMAND, error_class(&rejection), rejection.to_string(), 1)
        }
    }
}

fn error_class(rejection: &PriceRejection) -> &'static str {
    match rejection {
        PriceRejection::Malformed { .. } => "malformed_price",
        PriceRejection::Negative { .. } => "negative_price",
        PriceRejection::BelowMinimum { .. } => "below_minimum",
    }
}
