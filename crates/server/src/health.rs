use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use pwyc_core::domain::event::EventId;
use pwyc_core::hooks::ExtensionRegistry;
use pwyc_core::settings::{SettingKey, SettingsStore};
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    store: Arc<dyn SettingsStore>,
    registry: Arc<ExtensionRegistry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub settings_store: HealthCheck,
    pub checked_at: String,
}

pub fn router(store: Arc<dyn SettingsStore>, registry: Arc<ExtensionRegistry>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { store, registry })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let settings_store = store_check(state.store.as_ref());
    let ready = settings_store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("{} plugin(s) registered", state.registry.len()),
        },
        settings_store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn store_check(store: &dyn SettingsStore) -> HealthCheck {
    let probe = EventId("health/probe".to_string());
    match store.get(&probe, &SettingKey::DefaultExplanation) {
        Ok(_) => {
            HealthCheck { status: "ready", detail: "settings store read succeeded".to_string() }
        }
        Err(error) => HealthCheck {
            status: "degraded",
            detail: format!("settings store read failed: {error}"),
        },
    }
}
