//! Event-manager routes.
//!
//! HTML:
//! - `GET  /control/event/{organizer}/{event}/settings/pwyc/`  render the default-explanation form
//! - `POST /control/event/{organizer}/{event}/settings/pwyc/`  save it
//!
//! JSON:
//! - `GET  /control/event/{organizer}/{event}/items/{item_id}/pwyc/`  item form values
//! - `POST /control/event/{organizer}/{event}/items/{item_id}/pwyc/`  save item settings
//! - `GET  /control/event/{organizer}/{event}/settings/pwyc/log/`    rendered audit entries

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Form, Json, Router,
};
use pwyc_core::domain::event::EventContext;
use pwyc_core::domain::item::ItemRef;
use pwyc_core::hooks::{HostHooks, SETTINGS_VIEW};
use pwyc_core::item_config::{ItemSettingsForm, PricingConfig};
use pwyc_core::settings::{SettingKey, SettingValue};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use tracing::{error, info};
use uuid::Uuid;

use crate::bootstrap::AppState;
use crate::error::{interface_error, HandlerError};

const SETTINGS_TEMPLATE: &str = "settings.html";

const SETTINGS_SOURCE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Pay What You Can</title></head>
<body>
<nav class="settings-nav">
{% for entry in nav %}  <a href="{{ entry.url }}"
     {%- if entry.active %} class="active"{% endif %}>{{ entry.label }}</a>
{% endfor %}</nav>
{% if saved %}<div class="alert alert-success">Your settings have been saved.</div>
{% endif %}<form method="post">
  <label for="id_pwyc_explanation_default">Default explanation text</label>
  <textarea name="pwyc_explanation_default" id="id_pwyc_explanation_default">
    {{- explanation_default -}}
  </textarea>
  <p class="help-block">Default text explaining the PWYC option to customers.</p>
  <button type="submit">Save</button>
</form>
</body>
</html>
"#;

pub fn init_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_template(SETTINGS_TEMPLATE, SETTINGS_SOURCE)?;
    Ok(tera)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/control/event/{organizer}/{event}/settings/pwyc/",
            get(settings_page).post(save_settings),
        )
        .route("/control/event/{organizer}/{event}/settings/pwyc/log/", get(audit_log))
        .route(
            "/control/event/{organizer}/{event}/items/{item_id}/pwyc/",
            get(item_settings).post(save_item_settings),
        )
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsPageForm {
    #[serde(default)]
    pub pwyc_explanation_default: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveItemSettingsRequest {
    #[serde(default)]
    pub item_name: String,
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(flatten)]
    pub form: ItemSettingsForm,
}

#[derive(Debug, Serialize)]
pub struct AuditLine {
    pub action_type: String,
    pub occurred_at: String,
    pub display: String,
}

type PageError = (StatusCode, Html<String>);

fn event_context(state: &AppState, organizer: &str, event: &str) -> EventContext {
    EventContext::new(organizer, event, state.currency.clone())
}

async fn settings_page(
    State(state): State<AppState>,
    Path((organizer, event)): Path<(String, String)>,
) -> Result<Html<String>, PageError> {
    let event = event_context(&state, &organizer, &event);
    let stored = state.store.get(&event.id, &SettingKey::DefaultExplanation).map_err(|error| {
        page_error(&event, "settings could not be read", &error.to_string())
    })?;
    let explanation = stored
        .map(|value| value.as_text())
        .unwrap_or_else(|| state.plugin.fallback_explanation().to_string());

    render_settings(&state, &event, &explanation, false)
}

async fn save_settings(
    State(state): State<AppState>,
    Path((organizer, event)): Path<(String, String)>,
    Form(form): Form<SettingsPageForm>,
) -> Result<Html<String>, PageError> {
    let event = event_context(&state, &organizer, &event);
    let explanation = form.pwyc_explanation_default.trim().to_string();
    let value = (!explanation.is_empty()).then(|| SettingValue::Text(explanation.clone()));

    state
        .store
        .set(&event.id, SettingKey::DefaultExplanation, value)
        .map_err(|error| page_error(&event, "settings could not be saved", &error.to_string()))?;

    info!(
        event_name = "pwyc.settings.default_saved",
        event_id = %event.id,
        "default explanation saved"
    );

    render_settings(&state, &event, &explanation, true)
}

fn render_settings(
    state: &AppState,
    event: &EventContext,
    explanation: &str,
    saved: bool,
) -> Result<Html<String>, PageError> {
    let mut context = Context::new();
    context.insert("nav", &state.registry.settings_nav(event, Some(SETTINGS_VIEW)));
    context.insert("explanation_default", explanation);
    context.insert("saved", &saved);

    state
        .templates
        .render(SETTINGS_TEMPLATE, &context)
        .map(Html)
        .map_err(|error| {
            page_error(event, "settings page could not be rendered", &error.to_string())
        })
}

fn page_error(event: &EventContext, message: &str, detail: &str) -> PageError {
    error!(
        event_name = "pwyc.settings.page_failed",
        event_id = %event.id,
        error = detail,
        "{message}"
    );
    (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Internal error</h1>".to_string()))
}

async fn item_settings(
    State(state): State<AppState>,
    Path((organizer, event, item_id)): Path<(String, String, u64)>,
) -> Result<Json<ItemSettingsForm>, HandlerError> {
    let event = event_context(&state, &organizer, &event);
    let item = ItemRef::new(item_id, "");

    let form = state
        .plugin
        .item_settings(&event, &item)
        .map_err(|error| interface_error(error, &Uuid::new_v4().to_string()))?;

    Ok(Json(form.unwrap_or_default()))
}

async fn save_item_settings(
    State(state): State<AppState>,
    Path((organizer, event, item_id)): Path<(String, String, u64)>,
    Json(request): Json<SaveItemSettingsRequest>,
) -> Result<Json<PricingConfig>, HandlerError> {
    let event = event_context(&state, &organizer, &event);
    let item = ItemRef::new(item_id, request.item_name);

    let saved = state
        .plugin
        .save_item_settings(&event, request.actor.as_deref(), &item, &request.form)
        .map_err(|error| interface_error(error, &Uuid::new_v4().to_string()))?;

    Ok(Json(saved.unwrap_or_default()))
}

async fn audit_log(
    State(state): State<AppState>,
    Path((organizer, event)): Path<(String, String)>,
) -> Json<Vec<AuditLine>> {
    let event = event_context(&state, &organizer, &event);

    let lines = state
        .audit
        .entries()
        .into_iter()
        .filter(|entry| entry.event_id == event.id)
        .filter_map(|entry| {
            let display = state.registry.audit_display(&entry)?;
            Some(AuditLine {
                action_type: entry.action_type,
                occurred_at: entry.occurred_at.to_rfc3339(),
                display,
            })
        })
        .collect();

    Json(lines)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use pwyc_core::audit::InMemoryAuditLog;
    use pwyc_core::config::AppConfig;
    use pwyc_core::domain::event::EventId;
    use pwyc_core::settings::{InMemorySettingsStore, SettingKey, SettingValue, SettingsStore};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::router;
    use crate::bootstrap::{build_state, AppState};

    fn state() -> AppState {
        build_state(
            Arc::new(InMemorySettingsStore::default()),
            InMemoryAuditLog::default(),
            &AppConfig::default(),
        )
        .expect("state builds")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8 body")
    }

    fn demo_event() -> EventId {
        EventId("demo/summer".to_string())
    }

    #[tokio::test]
    async fn settings_page_shows_stored_default_and_nav_entry() {
        let state = state();
        state
            .store
            .set(
                &demo_event(),
                SettingKey::DefaultExplanation,
                Some(SettingValue::Text("Pay <what> you can".to_string())),
            )
            .expect("seed");

        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/control/event/demo/summer/settings/pwyc/")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Pay &lt;what&gt; you can"));
        assert!(html.contains(r#"class="active">Pay What You Can</a>"#));
        assert!(!html.contains("Your settings have been saved."));
    }

    #[tokio::test]
    async fn saving_the_settings_page_persists_and_confirms() {
        let state = state();
        let store = state.store.clone();

        let response = router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/control/event/demo/summer/settings/pwyc/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("pwyc_explanation_default=Everyone+is+welcome"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.contains("Your settings have been saved."));
        assert_eq!(
            store.get(&demo_event(), &SettingKey::DefaultExplanation).expect("get"),
            Some(SettingValue::Text("Everyone is welcome".to_string()))
        );
    }

    #[tokio::test]
    async fn blank_default_explanation_clears_the_key() {
        let state = state();
        let store = state.store.clone();
        store
            .set(
                &demo_event(),
                SettingKey::DefaultExplanation,
                Some(SettingValue::Text("old".to_string())),
            )
            .expect("seed");

        router(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/control/event/demo/summer/settings/pwyc/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("pwyc_explanation_default=+++"))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(store.get(&demo_event(), &SettingKey::DefaultExplanation).expect("get"), None);
    }

    #[tokio::test]
    async fn item_settings_round_trip_and_audit_the_toggle() {
        let state = state();
        let app = router(state);

        let saved = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/control/event/demo/summer/items/7/pwyc/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "item_name": "Festival pass",
                            "actor": "admin",
                            "enabled": true,
                            "min_amount": "5.00",
                            "explanation": " Fair price ",
                        })
                        .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(saved.status(), StatusCode::OK);

        let form = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/control/event/demo/summer/items/7/pwyc/")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let form: Value = serde_json::from_str(&body_text(form).await).expect("json");
        assert_eq!(form["enabled"], true);
        assert_eq!(form["min_amount"], "5.00");
        assert_eq!(form["explanation"], "Fair price");

        let log = app
            .oneshot(
                Request::builder()
                    .uri("/control/event/demo/summer/settings/pwyc/log/")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        let log: Value = serde_json::from_str(&body_text(log).await).expect("json");
        assert_eq!(log[0]["action_type"], "pwyc.item.enabled");
        assert_eq!(
            log[0]["display"],
            "Pay What You Can has been enabled for item \"Festival pass\"."
        );
    }

    #[tokio::test]
    async fn negative_item_minimum_is_a_bad_request() {
        let response = router(state())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/control/event/demo/summer/items/7/pwyc/")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"enabled": true, "min_amount": "-1"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["error"], "min_amount: must not be negative");
    }
}
