use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::cart::CartLine;
use crate::domain::event::EventId;
use crate::domain::item::ItemRef;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    ItemEnabled,
    ItemDisabled,
    PriceChanged,
}

impl AuditKind {
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::ItemEnabled => "pwyc.item.enabled",
            Self::ItemDisabled => "pwyc.item.disabled",
            Self::PriceChanged => "pwyc.order.price_changed",
        }
    }

    pub fn from_action_type(action_type: &str) -> Option<Self> {
        match action_type {
            "pwyc.item.enabled" => Some(Self::ItemEnabled),
            "pwyc.item.disabled" => Some(Self::ItemDisabled),
            "pwyc.order.price_changed" => Some(Self::PriceChanged),
            _ => None,
        }
    }
}

/// One immutable audit record. `action_type` is a free string because the host's
/// audit UI also hands us entries written by other components.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub action_type: String,
    pub event_id: EventId,
    pub actor: Option<String>,
    pub subject: String,
    pub data: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        kind: AuditKind,
        event: &EventId,
        actor: Option<&str>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            entry_id: Uuid::new_v4().to_string(),
            action_type: kind.action_type().to_string(),
            event_id: event.clone(),
            actor: actor.map(str::to_string),
            subject: subject.into(),
            data: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn kind(&self) -> Option<AuditKind> {
        AuditKind::from_action_type(&self.action_type)
    }

    pub fn item_enabled(event: &EventId, actor: Option<&str>, item: &ItemRef) -> Self {
        Self::new(AuditKind::ItemEnabled, event, actor, format!("item:{}", item.id))
            .with_data("id", item.id.to_string())
            .with_data("name", item.name.clone())
    }

    pub fn item_disabled(event: &EventId, actor: Option<&str>, item: &ItemRef) -> Self {
        Self::new(AuditKind::ItemDisabled, event, actor, format!("item:{}", item.id))
            .with_data("id", item.id.to_string())
            .with_data("name", item.name.clone())
    }

    pub fn price_changed(
        event: &EventId,
        line: &CartLine,
        original_price: &str,
        custom_price: Decimal,
    ) -> Self {
        Self::new(AuditKind::PriceChanged, event, None, format!("position:{}", line.position_id))
            .with_data("position", line.position_id.to_string())
            .with_data("item", line.display_name())
            .with_data("original_price", original_price)
            .with_data("price", custom_price.to_string())
    }
}

pub trait AuditLog: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditLog {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditLog {
    pub fn entries(&self) -> Vec<AuditEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditLog for InMemoryAuditLog {
    fn record(&self, entry: AuditEntry) {
        info!(
            event_name = "pwyc.audit.recorded",
            action_type = %entry.action_type,
            event_id = %entry.event_id,
            subject = %entry.subject,
            "audit entry recorded"
        );
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// Builds an entry from its parts and appends it to `log`.
pub fn record(
    log: &dyn AuditLog,
    kind: AuditKind,
    event: &EventId,
    actor: Option<&str>,
    subject: impl Into<String>,
    extra: BTreeMap<String, String>,
) {
    let mut entry = AuditEntry::new(kind, event, actor, subject);
    entry.data.extend(extra);
    log.record(entry);
}

/// Human-readable text for the host's audit view, or `None` for entries this
/// plugin does not own.
pub fn render(entry: &AuditEntry) -> Option<String> {
    let name = || entry.data.get("name").cloned().unwrap_or_else(|| entry.subject.clone());

    match entry.kind()? {
        AuditKind::ItemEnabled => {
            Some(format!("Pay What You Can has been enabled for item \"{}\".", name()))
        }
        AuditKind::ItemDisabled => {
            Some(format!("Pay What You Can has been disabled for item \"{}\".", name()))
        }
        AuditKind::PriceChanged => {
            let item = entry.data.get("item").cloned().unwrap_or_else(|| entry.subject.clone());
            let price = entry.data.get("price").map(String::as_str).unwrap_or("?");
            match entry.data.get("original_price") {
                Some(original) => Some(format!(
                    "A custom price of {price} was chosen for \"{item}\" \
                     (regular price {original})."
                )),
                None => Some(format!("A custom price of {price} was chosen for \"{item}\".")),
            }
        }
    }
}
