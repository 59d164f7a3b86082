use std::sync::Arc;

use pwyc_core::audit::InMemoryAuditLog;
use pwyc_core::config::{AppConfig, LoadOptions};
use pwyc_core::domain::event::EventContext;
use pwyc_core::domain::item::{ItemId, ItemRef};
use pwyc_core::hooks::{HostHooks, PayWhatYouCan};
use pwyc_core::item_config::{save_item_config, PricingConfig};
use pwyc_core::settings::{InMemorySettingsStore, SettingKey};
use rust_decimal::Decimal;
use serde::Serialize;

const WIDGET_CHECK: &str = "widget_rendering";
const LAYOUT_CHECK: &str = "settings_layout";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn outcome(name: &'static str, result: Result<String, String>) -> Self {
        match result {
            Ok(details) => Self { name, status: CheckStatus::Pass, details },
            Err(details) => Self { name, status: CheckStatus::Fail, details },
        }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| error.to_string());
    let report = build_report(config);

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            let detail = error.to_string().replace('\\', "\\\\").replace('"', "\\\"");
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\
                 \"error\":\"{detail}\"}}"
            )
        });
    }

    render_human(&report)
}

fn build_report(config: Result<AppConfig, String>) -> DoctorReport {
    let checks = match config {
        Ok(config) => vec![
            DoctorCheck::outcome(
                "config_validation",
                Ok("configuration loaded and validated".to_string()),
            ),
            DoctorCheck::outcome(WIDGET_CHECK, render_probe_widget(&config)),
            DoctorCheck::outcome(LAYOUT_CHECK, check_settings_layout()),
        ],
        Err(error) => vec![
            DoctorCheck::outcome("config_validation", Err(error)),
            DoctorCheck::skipped(WIDGET_CHECK),
            DoctorCheck::skipped(LAYOUT_CHECK),
        ],
    };

    let failed = checks.iter().filter(|check| check.status != CheckStatus::Pass).count();
    let (overall_status, summary) = if failed == 0 {
        (CheckStatus::Pass, "doctor: all readiness checks passed".to_string())
    } else {
        (CheckStatus::Fail, format!("doctor: {failed} readiness check(s) failed or skipped"))
    };

    DoctorReport { overall_status, summary, checks }
}

/// Renders the price widget for a throwaway enabled item in the configured currency.
fn render_probe_widget(config: &AppConfig) -> Result<String, String> {
    let store = InMemorySettingsStore::default();
    let plugin = PayWhatYouCan::new(
        Arc::new(store.clone()),
        Arc::new(InMemoryAuditLog::default()),
        config.pricing.default_explanation.clone(),
    )
    .map_err(|error| error.to_string())?;

    let event = EventContext::new("doctor", "probe", config.pricing.currency.clone());
    let probe = PricingConfig {
        enabled: true,
        min_amount: Some(Decimal::ONE),
        suggested_amount: None,
        explanation: config.pricing.default_explanation.clone(),
    };
    save_item_config(&store, &event.id, ItemId(1), &probe)
        .map_err(|error| format!("in-memory settings store rejected probe item: {error}"))?;

    let html = plugin.item_description(&event, &ItemRef::new(1, "probe"));
    if html.contains("pwyc-form-1") {
        Ok(format!("price widget rendered for currency {}", config.pricing.currency))
    } else {
        Err("price widget markup was empty".to_string())
    }
}

/// Lists the persisted key names so operators can match them against the host's store.
fn check_settings_layout() -> Result<String, String> {
    let mut names: Vec<String> =
        SettingKey::item_keys(ItemId(1)).iter().map(SettingKey::storage_name).collect();
    names.push(SettingKey::DefaultExplanation.storage_name());

    if names.iter().all(|name| name.starts_with("pwyc_")) {
        Ok(names.join(", "))
    } else {
        Err(format!("unexpected settings key layout: {}", names.join(", ")))
    }
}

fn render_human(report: &DoctorReport) -> String {
    let lines = report.checks.iter().map(|check| {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        format!("- [{marker}] {}: {}", check.name, check.details)
    });

    std::iter::once(report.summary.clone()).chain(lines).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use pwyc_core::config::AppConfig;

    use super::{build_report, check_settings_layout, CheckStatus};

    #[test]
    fn default_config_passes_every_check() {
        let report = build_report(Ok(AppConfig::default()));

        assert_eq!(report.overall_status, CheckStatus::Pass);
        assert!(report.checks.iter().all(|check| check.status == CheckStatus::Pass));
    }

    #[test]
    fn config_failure_skips_dependent_checks() {
        let report = build_report(Err("server.port must be greater than zero".to_string()));

        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.checks[0].status, CheckStatus::Fail);
        assert_eq!(report.checks[1].status, CheckStatus::Skipped);
        assert_eq!(report.checks[2].status, CheckStatus::Skipped);
    }

    #[test]
    fn layout_lists_persisted_names() {
        let names = check_settings_layout().expect("layout");

        assert!(names.starts_with("pwyc_enabled_1, pwyc_min_amount_1"));
        assert!(names.ends_with("pwyc_explanation_default"));
    }
}
