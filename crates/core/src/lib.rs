pub mod audit;
pub mod cart;
pub mod config;
pub mod copy;
pub mod domain;
pub mod errors;
pub mod hooks;
pub mod item_config;
pub mod pricing;
pub mod render;
pub mod session;
pub mod settings;

pub use audit::{AuditEntry, AuditKind, AuditLog, InMemoryAuditLog};
pub use cart::{apply_price_overrides, AppliedOverride};
pub use copy::{copy_event, copy_item, CopySummary};
pub use domain::cart::{CartLine, Fee, ORIGINAL_PRICE_META_KEY};
pub use domain::event::{EventContext, EventId};
pub use domain::item::{ItemId, ItemRef};
pub use errors::{ApplicationError, InterfaceError};
pub use hooks::{ExtensionRegistry, HostHooks, PayWhatYouCan, SettingsNavEntry};
pub use item_config::{load_item_config, save_item_config, ItemSettingsForm, PricingConfig};
pub use pricing::{parse_price, submit_price, validate_price, PriceField, PriceRejection};
pub use session::{InMemorySession, Session};
pub use settings::{InMemorySettingsStore, SettingKey, SettingValue, SettingsStore, StoreError};
