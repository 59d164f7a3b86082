//! Extension points the host calls into.
//!
//! Every plugin implements [`HostHooks`]; the host builds one [`ExtensionRegistry`]
//! at startup and dispatches through it. Default methods are no-ops so a plugin only
//! overrides the points it cares about.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, warn};

use crate::audit::{render, AuditEntry, AuditLog};
use crate::cart::apply_price_overrides;
use crate::copy::{copy_event, copy_item};
use crate::domain::cart::{CartLine, Fee};
use crate::domain::event::{EventContext, EventId};
use crate::domain::item::{ItemId, ItemRef};
use crate::errors::ApplicationError;
use crate::item_config::{is_enabled, load_item_config, ItemSettingsForm, PricingConfig};
use crate::render::DescriptionRenderer;
use crate::session::{enumerate_prices, Session};
use crate::settings::SettingsStore;

/// Name of the plugin's settings view, as passed in `current_view`.
pub const SETTINGS_VIEW: &str = "pwyc:settings";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsNavEntry {
    pub label: String,
    pub url: String,
    pub active: bool,
}

pub fn settings_url(event: &EventContext) -> String {
    format!("/control/event/{}/{}/settings/pwyc/", event.organizer, event.slug)
}

pub trait HostHooks: Send + Sync {
    fn item_description(&self, _event: &EventContext, _item: &ItemRef) -> String {
        String::new()
    }

    fn item_settings(
        &self,
        _event: &EventContext,
        _item: &ItemRef,
    ) -> Result<Option<ItemSettingsForm>, ApplicationError> {
        Ok(None)
    }

    fn save_item_settings(
        &self,
        _event: &EventContext,
        _actor: Option<&str>,
        _item: &ItemRef,
        _form: &ItemSettingsForm,
    ) -> Result<Option<PricingConfig>, ApplicationError> {
        Ok(None)
    }

    fn compute_fees(
        &self,
        _event: &EventContext,
        _lines: &mut [CartLine],
        _session: Option<&dyn Session>,
    ) -> Vec<Fee> {
        Vec::new()
    }

    fn order_meta(
        &self,
        _event: &EventContext,
        _session: Option<&dyn Session>,
    ) -> Map<String, Value> {
        Map::new()
    }

    fn settings_nav(
        &self,
        _event: &EventContext,
        _current_view: Option<&str>,
    ) -> Vec<SettingsNavEntry> {
        Vec::new()
    }

    fn audit_display(&self, _entry: &AuditEntry) -> Option<String> {
        None
    }

    fn event_copied(&self, _source: &EventId, _target: &EventId, _item_map: &[(ItemId, ItemId)]) {}

    fn item_copied(
        &self,
        _source_event: &EventId,
        _source_item: ItemId,
        _target_event: &EventId,
        _target_item: ItemId,
    ) {
    }
}

/// The "pay what you can" plugin wired to host-owned stores.
pub struct PayWhatYouCan {
    store: Arc<dyn SettingsStore>,
    audit: Arc<dyn AuditLog>,
    renderer: DescriptionRenderer,
    fallback_explanation: String,
}

impl PayWhatYouCan {
    pub fn new(
        store: Arc<dyn SettingsStore>,
        audit: Arc<dyn AuditLog>,
        fallback_explanation: impl Into<String>,
    ) -> Result<Self, ApplicationError> {
        let renderer = DescriptionRenderer::new()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self { store, audit, renderer, fallback_explanation: fallback_explanation.into() })
    }

    pub fn store(&self) -> &dyn SettingsStore {
        self.store.as_ref()
    }

    pub fn audit(&self) -> &dyn AuditLog {
        self.audit.as_ref()
    }

    pub fn fallback_explanation(&self) -> &str {
        &self.fallback_explanation
    }
}

impl HostHooks for PayWhatYouCan {
    fn item_description(&self, event: &EventContext, item: &ItemRef) -> String {
        let config = match load_item_config(self.store(), &event.id, item.id) {
            Ok(config) if config.enabled => config,
            Ok(_) => return String::new(),
            Err(error) => {
                warn!(
                    event_name = "pwyc.description.settings_unavailable",
                    event_id = %event.id,
                    item_id = %item.id,
                    error = %error,
                    "omitting price widget"
                );
                return String::new();
            }
        };

        match self.renderer.render(event, item.id, &config) {
            Ok(html) => html,
            Err(error) => {
                error!(
                    event_name = "pwyc.description.render_failed",
                    event_id = %event.id,
                    item_id = %item.id,
                    error = %error,
                    "price widget markup could not be rendered"
                );
                String::new()
            }
        }
    }

    fn item_settings(
        &self,
        event: &EventContext,
        item: &ItemRef,
    ) -> Result<Option<ItemSettingsForm>, ApplicationError> {
        ItemSettingsForm::initial(self.store(), &event.id, item.id, &self.fallback_explanation)
            .map(Some)
            .map_err(ApplicationError::from)
    }

    fn save_item_settings(
        &self,
        event: &EventContext,
        actor: Option<&str>,
        item: &ItemRef,
        form: &ItemSettingsForm,
    ) -> Result<Option<PricingConfig>, ApplicationError> {
        form.save(self.store(), self.audit(), &event.id, actor, item).map(Some)
    }

    fn compute_fees(
        &self,
        event: &EventContext,
        lines: &mut [CartLine],
        session: Option<&dyn Session>,
    ) -> Vec<Fee> {
        let applied = apply_price_overrides(self.store(), &event.id, lines, session);

        for change in applied.iter().filter(|change| change.first_application) {
            if let Some(line) = lines.iter().find(|line| line.position_id == change.position_id) {
                self.audit.record(AuditEntry::price_changed(
                    &event.id,
                    line,
                    &change.original_price,
                    change.custom_price,
                ));
            }
        }

        Vec::new()
    }

    fn order_meta(
        &self,
        event: &EventContext,
        session: Option<&dyn Session>,
    ) -> Map<String, Value> {
        let Some(session) = session else {
            return Map::new();
        };

        let prices: Map<String, Value> = enumerate_prices(session)
            .into_iter()
            .filter(|(item, _)| is_enabled(self.store(), &event.id, *item))
            .map(|(item, price)| (item.to_string(), Value::String(price.to_string())))
            .collect();

        let mut meta = Map::new();
        if !prices.is_empty() {
            meta.insert("pwyc_prices".to_string(), Value::Object(prices));
        }
        meta
    }

    fn settings_nav(
        &self,
        event: &EventContext,
        current_view: Option<&str>,
    ) -> Vec<SettingsNavEntry> {
        vec![SettingsNavEntry {
            label: "Pay What You Can".to_string(),
            url: settings_url(event),
            active: current_view == Some(SETTINGS_VIEW),
        }]
    }

    fn audit_display(&self, entry: &AuditEntry) -> Option<String> {
        render(entry)
    }

    fn event_copied(&self, source: &EventId, target: &EventId, item_map: &[(ItemId, ItemId)]) {
        if let Err(error) = copy_event(self.store(), source, target, item_map) {
            error!(
                event_name = "pwyc.copy.event_failed",
                source_event = %source,
                target_event = %target,
                error = %error,
                "event pricing settings were not copied"
            );
        }
    }

    fn item_copied(
        &self,
        source_event: &EventId,
        source_item: ItemId,
        target_event: &EventId,
        target_item: ItemId,
    ) {
        let copied = copy_item(self.store(), source_event, source_item, target_event, target_item);
        if let Err(error) = copied {
            error!(
                event_name = "pwyc.copy.item_failed",
                source_event = %source_event,
                source_item = %source_item,
                target_event = %target_event,
                target_item = %target_item,
                error = %error,
                "item pricing settings were not copied"
            );
        }
    }
}

/// Every registered plugin, in registration order.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    plugins: Vec<Arc<dyn HostHooks>>,
}

impl ExtensionRegistry {
    pub fn register(&mut self, plugin: Arc<dyn HostHooks>) -> &mut Self {
        self.plugins.push(plugin);
        self
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn item_description(&self, event: &EventContext, item: &ItemRef) -> String {
        self.plugins.iter().map(|plugin| plugin.item_description(event, item)).collect()
    }

    pub fn compute_fees(
        &self,
        event: &EventContext,
        lines: &mut [CartLine],
        session: Option<&dyn Session>,
    ) -> Vec<Fee> {
        let mut fees = Vec::new();
        for plugin in &self.plugins {
            fees.extend(plugin.compute_fees(event, lines, session));
        }
        fees
    }

    pub fn order_meta(
        &self,
        event: &EventContext,
        session: Option<&dyn Session>,
    ) -> Map<String, Value> {
        let mut meta = Map::new();
        for plugin in &self.plugins {
            meta.extend(plugin.order_meta(event, session));
        }
        meta
    }

    pub fn settings_nav(
        &self,
        event: &EventContext,
        current_view: Option<&str>,
    ) -> Vec<SettingsNavEntry> {
        self.plugins.iter().flat_map(|plugin| plugin.settings_nav(event, current_view)).collect()
    }

    pub fn audit_display(&self, entry: &AuditEntry) -> Option<String> {
        self.plugins.iter().find_map(|plugin| plugin.audit_display(entry))
    }

    pub fn event_copied(&self, source: &EventId, target: &EventId, item_map: &[(ItemId, ItemId)]) {
        for plugin in &self.plugins {
            plugin.event_copied(source, target, item_map);
        }
    }

    pub fn item_copied(
        &self,
        source_event: &EventId,
        source_item: ItemId,
        target_event: &EventId,
        target_item: ItemId,
    ) {
        for plugin in &self.plugins {
            plugin.item_copied(source_event, source_item, target_event, target_item);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use crate::audit::{AuditKind, InMemoryAuditLog};
    use crate::domain::cart::CartLine;
    use crate::domain::event::{EventContext, EventId};
    use crate::domain::item::{ItemId, ItemRef};
    use crate::item_config::{load_item_config, save_item_config, ItemSettingsForm, PricingConfig};
    use crate::session::{set_price, InMemorySession};
    use crate::settings::InMemorySettingsStore;

    use super::{ExtensionRegistry, HostHooks, PayWhatYouCan, SETTINGS_VIEW};

    struct Fixture {
        store: InMemorySettingsStore,
        audit: InMemoryAuditLog,
        registry: ExtensionRegistry,
        event: EventContext,
    }

    struct SilentPlugin;

    impl HostHooks for SilentPlugin {}

    fn fixture() -> Fixture {
        let store = InMemorySettingsStore::default();
        let audit = InMemoryAuditLog::default();
        let plugin = PayWhatYouCan::new(Arc::new(store.clone()), Arc::new(audit.clone()), "")
            .expect("plugin builds");
        let mut registry = ExtensionRegistry::default();
        registry.register(Arc::new(SilentPlugin)).register(Arc::new(plugin));

        Fixture { store, audit, registry, event: EventContext::new("demo", "summer", "EUR") }
    }

    fn enable(fixture: &Fixture, item: ItemId) {
        save_item_config(
            &fixture.store,
            &fixture.event.id,
            item,
            &PricingConfig {
                enabled: true,
                min_amount: Some(Decimal::new(500, 2)),
                ..Default::default()
            },
        )
        .expect("save");
    }

    #[test]
    fn description_only_for_enabled_items() {
        let fixture = fixture();
        enable(&fixture, ItemId(1));

        let enabled = fixture.registry.item_description(&fixture.event, &ItemRef::new(1, "Pass"));
        let disabled = fixture.registry.item_description(&fixture.event, &ItemRef::new(2, "Other"));

        assert!(enabled.contains("pwyc-form-1"));
        assert_eq!(disabled, "");
    }

    #[test]
    fn fee_hook_overrides_prices_and_audits_once() {
        let fixture = fixture();
        enable(&fixture, ItemId(1));
        let mut session = InMemorySession::default();
        set_price(&mut session, ItemId(1), Decimal::new(750, 2));
        let mut lines =
            vec![CartLine::new(10, ItemId(1), Decimal::new(1000, 2)).with_item_name("Pass")];

        let fees = fixture.registry.compute_fees(&fixture.event, &mut lines, Some(&session));
        fixture.registry.compute_fees(&fixture.event, &mut lines, Some(&session));

        assert!(fees.is_empty());
        assert_eq!(lines[0].price, Decimal::new(750, 2));
        assert_eq!(lines[0].original_price(), Some("10.00"));
        let audited: Vec<_> = fixture.audit.entries();
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].kind(), Some(AuditKind::PriceChanged));
        assert_eq!(audited[0].data.get("original_price").map(String::as_str), Some("10.00"));
        assert_eq!(
            fixture.registry.audit_display(&audited[0]).as_deref(),
            Some("A custom price of 7.50 was chosen for \"Pass\" (regular price 10.00).")
        );
    }

    #[test]
    fn order_meta_lists_enabled_session_prices() {
        let fixture = fixture();
        enable(&fixture, ItemId(1));
        let mut session = InMemorySession::default();
        set_price(&mut session, ItemId(1), Decimal::new(750, 2));
        set_price(&mut session, ItemId(2), Decimal::new(100, 2));

        let meta = fixture.registry.order_meta(&fixture.event, Some(&session));

        assert_eq!(meta["pwyc_prices"], serde_json::json!({ "1": "7.50" }));
        assert!(fixture.registry.order_meta(&fixture.event, None).is_empty());
    }

    #[test]
    fn settings_nav_marks_active_view() {
        let fixture = fixture();

        let entries = fixture.registry.settings_nav(&fixture.event, Some(SETTINGS_VIEW));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].url, "/control/event/demo/summer/settings/pwyc/");
        assert!(entries[0].active);

        assert!(!fixture.registry.settings_nav(&fixture.event, Some("orders"))[0].active);
    }

    #[test]
    fn item_settings_round_trip_through_hooks() {
        let fixture = fixture();
        let plugin = PayWhatYouCan::new(
            Arc::new(fixture.store.clone()),
            Arc::new(fixture.audit.clone()),
            "Pay what you can afford",
        )
        .expect("plugin builds");
        let item = ItemRef::new(4, "Workshop");

        let initial = plugin.item_settings(&fixture.event, &item).expect("initial").expect("form");
        assert_eq!(initial.explanation, "Pay what you can afford");

        let form = ItemSettingsForm { enabled: true, ..initial };
        plugin.save_item_settings(&fixture.event, Some("admin"), &item, &form).expect("save");

        let saved = load_item_config(&fixture.store, &fixture.event.id, ItemId(4)).expect("load");
        assert!(saved.enabled);
        let rendered = fixture.registry.audit_display(&fixture.audit.entries()[0]);
        assert_eq!(
            rendered.as_deref(),
            Some("Pay What You Can has been enabled for item \"Workshop\".")
        );
    }

    #[test]
    fn clone_hooks_copy_settings() {
        let fixture = fixture();
        enable(&fixture, ItemId(1));
        let target = EventId("demo/winter".to_string());

        fixture.registry.event_copied(&fixture.event.id, &target, &[(ItemId(1), ItemId(21))]);
        fixture.registry.item_copied(&fixture.event.id, ItemId(1), &fixture.event.id, ItemId(2));

        assert!(load_item_config(&fixture.store, &target, ItemId(21)).expect("load").enabled);
        let copied_item =
            load_item_config(&fixture.store, &fixture.event.id, ItemId(2)).expect("load");
        assert!(copied_item.enabled);
    }
}
