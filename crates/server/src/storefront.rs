//! Customer-facing endpoint the price widget posts to.
//!
//! - `POST /pwyc/set-price/` with `{"item_id": 42, "price": "7.50"}`; an optional
//!   `"event": "<organizer>/<event>"` also enforces the item's minimum.
//! - `POST /{organizer}/{event}/pwyc/cart/` runs the fee and order-metadata hooks over
//!   the posted cart lines with the visitor's session, the way the host's checkout does.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    routing::post,
    Json, Router,
};
use pwyc_core::domain::cart::{CartLine, Fee, ORIGINAL_PRICE_META_KEY};
use pwyc_core::domain::event::{EventContext, EventId};
use pwyc_core::domain::item::ItemId;
use pwyc_core::errors::ApplicationError;
use pwyc_core::pricing::{parse_price, submit_price, validate_price};
use pwyc_core::session::{set_price, Session};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::bootstrap::AppState;
use crate::error::{interface_error, HandlerError};
use crate::sessions::session_cookie;

#[derive(Debug, Serialize)]
pub struct SetPriceResponse {
    pub success: bool,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub lines: Vec<CartLine>,
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub lines: Vec<CartLine>,
    pub fees: Vec<Fee>,
    pub meta: Map<String, Value>,
}

type SetCookie = Option<[(HeaderName, HeaderValue); 1]>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/pwyc/set-price/", post(set_price_handler))
        .route("/{organizer}/{event}/pwyc/cart/", post(price_cart))
        .with_state(state)
}

/// A decoded set-price body.
#[derive(Debug, PartialEq)]
struct PriceSubmission {
    item: ItemId,
    raw_price: String,
    event: Option<EventId>,
}

pub async fn set_price_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(SetCookie, Json<SetPriceResponse>), HandlerError> {
    let correlation_id = Uuid::new_v4().to_string();
    let submission =
        decode_submission(&body).map_err(|error| interface_error(error, &correlation_id))?;

    let handle = state.sessions.resolve(&headers, &state.session_cookie);
    let outcome = state.sessions.with_session(&handle.id, |session| match &submission.event {
        Some(event) => submit_price(
            state.store.as_ref(),
            session,
            event,
            submission.item,
            &submission.raw_price,
        ),
        None => parse_price(&submission.raw_price)
            .and_then(|price| validate_price(price, None))
            .map(|price| {
                set_price(session, submission.item, price);
                price
            })
            .map_err(ApplicationError::from),
    });

    let price = outcome.map_err(|error| interface_error(error, &correlation_id))?;

    info!(
        event_name = "pwyc.storefront.price_set",
        correlation_id = %correlation_id,
        item_id = %submission.item,
        price = %price,
        "custom price accepted"
    );

    let cookie = if handle.is_new {
        session_cookie(&state.session_cookie, &handle.id)
            .map(|value| [(header::SET_COOKIE, value)])
    } else {
        None
    };

    Ok((cookie, Json(SetPriceResponse { success: true, price })))
}

pub async fn price_cart(
    State(state): State<AppState>,
    Path((organizer, event)): Path<(String, String)>,
    headers: HeaderMap,
    Json(request): Json<CartRequest>,
) -> Json<CartResponse> {
    let event = EventContext::new(organizer, event, state.currency.clone());
    let handle = state.sessions.resolve(&headers, &state.session_cookie);
    let session = if handle.is_new { None } else { state.sessions.snapshot(&handle.id) };
    let session = session.as_ref().map(|session| session as &dyn Session);

    let mut lines = request.lines;
    for line in &mut lines {
        // Only the override pass may stash an original price.
        if line.meta_info.remove(ORIGINAL_PRICE_META_KEY).is_some() {
            warn!(
                event_name = "pwyc.storefront.client_stash_dropped",
                event_id = %event.id,
                position_id = line.position_id,
                "discarded client-supplied original price"
            );
        }
    }
    let fees = state.registry.compute_fees(&event, &mut lines, session);
    let meta = state.registry.order_meta(&event, session);

    Json(CartResponse { lines, fees, meta })
}

fn decode_submission(body: &[u8]) -> Result<PriceSubmission, ApplicationError> {
    let malformed = |message: &str| ApplicationError::Malformed(message.to_string());
    let payload: Value = serde_json::from_slice(body).map_err(|_| malformed("Invalid JSON"))?;

    let item = payload.get("item_id").and_then(item_id_from);
    let raw_price = match payload.get("price") {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => Some(raw.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(_) => return Err(malformed("Invalid price format")),
    };
    let (Some(item), Some(raw_price)) = (item, raw_price) else {
        return Err(malformed("Missing item_id or price"));
    };

    let event = payload
        .get("event")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|event| !event.is_empty())
        .map(|event| EventId(event.to_string()));

    Ok(PriceSubmission { item, raw_price, event })
}

/// Item ids arrive as JSON numbers or numeric strings. Zero is treated as absent.
fn item_id_from(value: &Value) -> Option<ItemId> {
    let item = match value {
        Value::Number(number) => number.as_u64().map(ItemId),
        Value::String(raw) => raw.parse::<ItemId>().ok(),
        _ => None,
    }?;
    (item.0 != 0).then_some(item)
}
