use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::event::EventId;
use crate::domain::item::ItemId;
use crate::settings::{SettingKey, SettingsStore, StoreError};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySummary {
    pub default_explanation_copied: bool,
    pub items_copied: Vec<ItemId>,
}

/// Copies the four item keys verbatim when the source item is pricing-enabled.
///
/// Returns whether anything was copied. Target values are overwritten; a key absent
/// at the source is removed at the target.
pub fn copy_item(
    store: &dyn SettingsStore,
    source_event: &EventId,
    source_item: ItemId,
    target_event: &EventId,
    target_item: ItemId,
) -> Result<bool, StoreError> {
    let enabled = store
        .get(source_event, &SettingKey::Enabled(source_item))?
        .and_then(|value| value.as_bool())
        .unwrap_or(false);
    if !enabled {
        return Ok(false);
    }

    for key in SettingKey::item_keys(source_item) {
        let value = store.get(source_event, &key)?;
        store.set(target_event, key.with_item(target_item), value)?;
    }

    info!(
        event_name = "pwyc.copy.item",
        source_event = %source_event,
        source_item = %source_item,
        target_event = %target_event,
        target_item = %target_item,
        "item pricing settings copied"
    );
    Ok(true)
}

/// Copies the event-wide default explanation, then every mapped item.
pub fn copy_event(
    store: &dyn SettingsStore,
    source_event: &EventId,
    target_event: &EventId,
    item_map: &[(ItemId, ItemId)],
) -> Result<CopySummary, StoreError> {
    let mut summary = CopySummary::default();

    if let Some(value) = store.get(source_event, &SettingKey::DefaultExplanation)? {
        store.set(target_event, SettingKey::DefaultExplanation, Some(value))?;
        summary.default_explanation_copied = true;
    }

    for (source_item, target_item) in item_map {
        if copy_item(store, source_event, *source_item, target_event, *target_item)? {
            summary.items_copied.push(*target_item);
        }
    }

    Ok(summary)
}
