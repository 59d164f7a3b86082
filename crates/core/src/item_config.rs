use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditLog};
use crate::domain::event::EventId;
use crate::domain::item::{ItemId, ItemRef};
use crate::errors::ApplicationError;
use crate::settings::{SettingKey, SettingValue, SettingsStore, StoreError};

/// Per-item "pay what you can" configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub enabled: bool,
    pub min_amount: Option<Decimal>,
    pub suggested_amount: Option<Decimal>,
    pub explanation: String,
}

/// Reads the four item keys. Missing or unreadable values fall back to defaults.
pub fn load_item_config(
    store: &dyn SettingsStore,
    event: &EventId,
    item: ItemId,
) -> Result<PricingConfig, StoreError> {
    let enabled = store
        .get(event, &SettingKey::Enabled(item))?
        .and_then(|value| coerce(event, SettingKey::Enabled(item), &value, SettingValue::as_bool))
        .unwrap_or(false);
    let min_amount = store.get(event, &SettingKey::MinAmount(item))?.and_then(|value| {
        coerce(event, SettingKey::MinAmount(item), &value, SettingValue::as_decimal)
    });
    let suggested_amount =
        store.get(event, &SettingKey::SuggestedAmount(item))?.and_then(|value| {
            coerce(event, SettingKey::SuggestedAmount(item), &value, SettingValue::as_decimal)
        });
    let explanation = store
        .get(event, &SettingKey::Explanation(item))?
        .map(|value| value.as_text())
        .unwrap_or_default();

    Ok(PricingConfig { enabled, min_amount, suggested_amount, explanation })
}

pub fn save_item_config(
    store: &dyn SettingsStore,
    event: &EventId,
    item: ItemId,
    config: &PricingConfig,
) -> Result<(), StoreError> {
    store.set(event, SettingKey::Enabled(item), Some(SettingValue::Bool(config.enabled)))?;
    store.set(event, SettingKey::MinAmount(item), config.min_amount.map(SettingValue::Decimal))?;
    store.set(
        event,
        SettingKey::SuggestedAmount(item),
        config.suggested_amount.map(SettingValue::Decimal),
    )?;
    store.set(
        event,
        SettingKey::Explanation(item),
        Some(SettingValue::Text(config.explanation.clone())),
    )?;
    Ok(())
}

/// Whether pricing is enabled for `item`; any store failure reads as disabled.
pub fn is_enabled(store: &dyn SettingsStore, event: &EventId, item: ItemId) -> bool {
    match load_item_config(store, event, item) {
        Ok(config) => config.enabled,
        Err(error) => {
            warn!(
                event_name = "pwyc.settings.read_failed",
                event_id = %event,
                item_id = %item,
                error = %error,
                "treating item as not pricing-enabled"
            );
            false
        }
    }
}

fn coerce<T>(
    event: &EventId,
    key: SettingKey,
    value: &SettingValue,
    read: impl Fn(&SettingValue) -> Option<T>,
) -> Option<T> {
    let parsed = read(value);
    if parsed.is_none() {
        warn!(
            event_name = "pwyc.settings.malformed_value",
            event_id = %event,
            setting = %key.storage_name(),
            "ignoring malformed setting value"
        );
    }
    parsed
}

/// The event manager's per-item configuration form.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSettingsForm {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub suggested_amount: Option<Decimal>,
    #[serde(default)]
    pub explanation: String,
}

impl ItemSettingsForm {
    /// Form values for an existing item. An item without its own explanation shows
    /// the event default, then `fallback_explanation`.
    pub fn initial(
        store: &dyn SettingsStore,
        event: &EventId,
        item: ItemId,
        fallback_explanation: &str,
    ) -> Result<Self, StoreError> {
        let config = load_item_config(store, event, item)?;
        let explanation = match store.get(event, &SettingKey::Explanation(item))? {
            Some(value) => value.as_text(),
            None => store
                .get(event, &SettingKey::DefaultExplanation)?
                .map(|value| value.as_text())
                .unwrap_or_else(|| fallback_explanation.to_string()),
        };

        Ok(Self {
            enabled: config.enabled,
            min_amount: config.min_amount,
            suggested_amount: config.suggested_amount,
            explanation,
        })
    }

    pub fn validate(&self) -> Result<PricingConfig, ApplicationError> {
        if let Some(minimum) = self.min_amount {
            if minimum < Decimal::ZERO {
                return Err(ApplicationError::InvalidSetting {
                    field: "min_amount",
                    message: "must not be negative".to_string(),
                });
            }
        }
        if let Some(suggested) = self.suggested_amount {
            if suggested < Decimal::ZERO {
                return Err(ApplicationError::InvalidSetting {
                    field: "suggested_amount",
                    message: "must not be negative".to_string(),
                });
            }
        }

        Ok(PricingConfig {
            enabled: self.enabled,
            min_amount: self.min_amount,
            suggested_amount: self.suggested_amount,
            explanation: self.explanation.trim().to_string(),
        })
    }

    /// Validates and persists the form, auditing a change of the enabled flag.
    pub fn save(
        &self,
        store: &dyn SettingsStore,
        audit: &dyn AuditLog,
        event: &EventId,
        actor: Option<&str>,
        item: &ItemRef,
    ) -> Result<PricingConfig, ApplicationError> {
        let config = self.validate()?;
        let previously_enabled = load_item_config(store, event, item.id)?.enabled;

        save_item_config(store, event, item.id, &config)?;
        info!(
            event_name = "pwyc.settings.item_saved",
            event_id = %event,
            item_id = %item.id,
            enabled = config.enabled,
            "item pricing settings saved"
        );

        if config.enabled != previously_enabled {
            let entry = if config.enabled {
                AuditEntry::item_enabled(event, actor, item)
            } else {
                AuditEntry::item_disabled(event, actor, item)
            };
            audit.record(entry);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::audit::{AuditKind, InMemoryAuditLog};
    use crate::domain::event::EventId;
    use crate::domain::item::{ItemId, ItemRef};
    use crate::errors::ApplicationError;
    use crate::settings::{InMemorySettingsStore, SettingKey, SettingValue, SettingsStore};

    use super::{load_item_config, save_item_config, ItemSettingsForm, PricingConfig};

    fn event() -> EventId {
        EventId("org/event".to_string())
    }

    #[test]
    fn missing_keys_load_as_defaults() {
        let store = InMemorySettingsStore::default();
        let config = load_item_config(&store, &event(), ItemId(1)).expect("load");
        assert_eq!(config, PricingConfig::default());
        assert!(!config.enabled);
        assert_eq!(config.explanation, "");
    }

    #[test]
    fn save_then_load_returns_same_config() {
        let store = InMemorySettingsStore::default();
        let config = PricingConfig {
            enabled: true,
            min_amount: Some(Decimal::new(500, 2)),
            suggested_amount: Some(Decimal::new(1500, 2)),
            explanation: "Pay what feels right".to_string(),
        };

        save_item_config(&store, &event(), ItemId(1), &config).expect("save");

        assert_eq!(load_item_config(&store, &event(), ItemId(1)).expect("load"), config);
    }

    #[test]
    fn host_text_values_are_understood() {
        let store = InMemorySettingsStore::default();
        let item = ItemId(5);
        store
            .set(&event(), SettingKey::Enabled(item), Some(SettingValue::Text("True".into())))
            .expect("set");
        store
            .set(&event(), SettingKey::MinAmount(item), Some(SettingValue::Text("5.00".into())))
            .expect("set");
        store
            .set(
                &event(),
                SettingKey::SuggestedAmount(item),
                Some(SettingValue::Text("n/a".into())),
            )
            .expect("set");

        let config = load_item_config(&store, &event(), item).expect("load");

        assert!(config.enabled);
        assert_eq!(config.min_amount, Some(Decimal::new(500, 2)));
        assert_eq!(config.suggested_amount, None);
    }

    #[test]
    fn initial_explanation_falls_back_to_event_default() {
        let store = InMemorySettingsStore::default();
        store
            .set(
                &event(),
                SettingKey::DefaultExplanation,
                Some(SettingValue::Text("Event default".into())),
            )
            .expect("set default");

        let form =
            ItemSettingsForm::initial(&store, &event(), ItemId(2), "Built-in").expect("initial");
        assert_eq!(form.explanation, "Event default");

        let other = EventId("org/other".to_string());
        let form =
            ItemSettingsForm::initial(&store, &other, ItemId(2), "Built-in").expect("initial");
        assert_eq!(form.explanation, "Built-in");
    }

    #[test]
    fn negative_amounts_are_rejected_before_saving() {
        let store = InMemorySettingsStore::default();
        let audit = InMemoryAuditLog::default();
        let form = ItemSettingsForm {
            enabled: true,
            min_amount: Some(Decimal::new(-1, 0)),
            ..ItemSettingsForm::default()
        };

        let error = form
            .save(&store, &audit, &event(), Some("admin"), &ItemRef::new(3, "Ticket"))
            .expect_err("negative minimum");

        assert!(matches!(error, ApplicationError::InvalidSetting { field: "min_amount", .. }));
        assert!(store.is_empty());
        assert!(audit.entries().is_empty());
    }

    #[test]
    fn toggling_enabled_records_audit_entries() {
        let store = InMemorySettingsStore::default();
        let audit = InMemoryAuditLog::default();
        let item = ItemRef::new(3, "Ticket");

        let enable = ItemSettingsForm { enabled: true, ..ItemSettingsForm::default() };
        enable.save(&store, &audit, &event(), Some("admin"), &item).expect("enable");
        enable.save(&store, &audit, &event(), Some("admin"), &item).expect("re-save");
        let disable = ItemSettingsForm::default();
        disable.save(&store, &audit, &event(), Some("admin"), &item).expect("disable");

        let kinds: Vec<Option<AuditKind>> =
            audit.entries().iter().map(|entry| entry.kind()).collect();
        assert_eq!(kinds, vec![Some(AuditKind::ItemEnabled), Some(AuditKind::ItemDisabled)]);
    }
}
