use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::event::EventId;
use crate::domain::item::ItemId;

/// A typed address inside one event's settings store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettingKey {
    Enabled(ItemId),
    MinAmount(ItemId),
    SuggestedAmount(ItemId),
    Explanation(ItemId),
    DefaultExplanation,
}

impl SettingKey {
    /// The four keys making up one item's pricing configuration.
    pub fn item_keys(item: ItemId) -> [SettingKey; 4] {
        [
            Self::Enabled(item),
            Self::MinAmount(item),
            Self::SuggestedAmount(item),
            Self::Explanation(item),
        ]
    }

    /// Name under which the host persists this key.
    pub fn storage_name(&self) -> String {
        match self {
            Self::Enabled(item) => format!("pwyc_enabled_{item}"),
            Self::MinAmount(item) => format!("pwyc_min_amount_{item}"),
            Self::SuggestedAmount(item) => format!("pwyc_suggested_amount_{item}"),
            Self::Explanation(item) => format!("pwyc_explanation_{item}"),
            Self::DefaultExplanation => "pwyc_explanation_default".to_string(),
        }
    }

    /// Re-targets an item-scoped key at another item. Event-wide keys are unchanged.
    pub fn with_item(self, item: ItemId) -> Self {
        match self {
            Self::Enabled(_) => Self::Enabled(item),
            Self::MinAmount(_) => Self::MinAmount(item),
            Self::SuggestedAmount(_) => Self::SuggestedAmount(item),
            Self::Explanation(_) => Self::Explanation(item),
            Self::DefaultExplanation => Self::DefaultExplanation,
        }
    }
}

/// Scalar held by the host settings store. Hosts often keep everything as text, so
/// the accessors below are lenient about the stored representation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Decimal(Decimal),
    Text(String),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            Self::Decimal(value) => Some(!value.is_zero()),
            Self::Text(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(value) => Some(*value),
            Self::Text(value) => Decimal::from_str(value.trim()).ok(),
            Self::Bool(_) => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(value) => value.to_string(),
            Self::Decimal(value) => value.to_string(),
            Self::Text(value) => value.clone(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("settings store unavailable: {0}")]
    Unavailable(String),
    #[error("settings store rejected `{key}`: {reason}")]
    Rejected { key: String, reason: String },
}

/// Host-owned per-event key-value persistence.
///
/// Writing `None` removes the key. Implementations own their locking; callers never
/// hold a lock across two calls.
pub trait SettingsStore: Send + Sync {
    fn get(&self, event: &EventId, key: &SettingKey) -> Result<Option<SettingValue>, StoreError>;
    fn set(
        &self,
        event: &EventId,
        key: SettingKey,
        value: Option<SettingValue>,
    ) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemorySettingsStore {
    values: Arc<Mutex<HashMap<(EventId, SettingKey), SettingValue>>>,
}

impl InMemorySettingsStore {
    pub fn len(&self) -> usize {
        match self.values.lock() {
            Ok(values) => values.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SettingsStore for InMemorySettingsStore {
    fn get(&self, event: &EventId, key: &SettingKey) -> Result<Option<SettingValue>, StoreError> {
        let values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(values.get(&(event.clone(), *key)).cloned())
    }

    fn set(
        &self,
        event: &EventId,
        key: SettingKey,
        value: Option<SettingValue>,
    ) -> Result<(), StoreError> {
        let mut values = match self.values.lock() {
            Ok(values) => values,
            Err(poisoned) => poisoned.into_inner(),
        };
        match value {
            Some(value) => {
                values.insert((event.clone(), key), value);
            }
            None => {
                values.remove(&(event.clone(), key));
            }
        }
        Ok(())
    }
}
