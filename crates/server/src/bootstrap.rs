use std::sync::Arc;
use std::time::Duration;

use pwyc_core::audit::{AuditLog, InMemoryAuditLog};
use pwyc_core::config::{AppConfig, ConfigError, LoadOptions};
use pwyc_core::errors::ApplicationError;
use pwyc_core::hooks::{ExtensionRegistry, PayWhatYouCan};
use pwyc_core::settings::{InMemorySettingsStore, SettingsStore};
use tera::Tera;
use thiserror::Error;
use tracing::info;

use crate::control;
use crate::sessions::SessionRegistry;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

/// Shared state handed to every router.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SettingsStore>,
    pub audit: InMemoryAuditLog,
    pub plugin: Arc<PayWhatYouCan>,
    pub registry: Arc<ExtensionRegistry>,
    pub sessions: SessionRegistry,
    pub templates: Arc<Tera>,
    pub session_cookie: String,
    pub currency: String,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("plugin initialisation failed: {0}")]
    Plugin(#[source] ApplicationError),
    #[error("settings page templates failed to compile: {0}")]
    Templates(#[source] tera::Error),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let store: Arc<dyn SettingsStore> = Arc::new(InMemorySettingsStore::default());
    let state = build_state(store, InMemoryAuditLog::default(), &config)?;

    info!(
        event_name = "system.bootstrap.plugins_registered",
        correlation_id = "bootstrap",
        plugin_count = state.registry.len(),
        "extension registry populated"
    );

    Ok(Application { config, state })
}

/// Wires the plugin and its registry over caller-provided stores.
pub fn build_state(
    store: Arc<dyn SettingsStore>,
    audit: InMemoryAuditLog,
    config: &AppConfig,
) -> Result<AppState, BootstrapError> {
    let audit_sink: Arc<dyn AuditLog> = Arc::new(audit.clone());
    let plugin = Arc::new(
        PayWhatYouCan::new(store.clone(), audit_sink, config.pricing.default_explanation.clone())
            .map_err(BootstrapError::Plugin)?,
    );

    let mut registry = ExtensionRegistry::default();
    registry.register(plugin.clone());

    let templates = control::init_templates().map_err(BootstrapError::Templates)?;

    Ok(AppState {
        store,
        audit,
        plugin,
        registry: Arc::new(registry),
        sessions: SessionRegistry::new(Duration::from_secs(config.server.session_ttl_secs)),
        templates: Arc::new(templates),
        session_cookie: config.server.session_cookie.clone(),
        currency: config.pricing.currency.clone(),
    })
}
