use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Config file locations probed when no explicit path is given.
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["pwyc.toml", "config/pwyc.toml"];

/// Environment variables for each settable key, in lookup order.
pub const ENV_BINDINGS: [(&str, &[&str]); 8] = [
    ("server.bind_address", &["PWYC_SERVER_BIND_ADDRESS"]),
    ("server.port", &["PWYC_SERVER_PORT"]),
    ("server.session_cookie", &["PWYC_SERVER_SESSION_COOKIE"]),
    ("server.session_ttl_secs", &["PWYC_SERVER_SESSION_TTL_SECS"]),
    ("pricing.currency", &["PWYC_PRICING_CURRENCY"]),
    ("pricing.default_explanation", &["PWYC_PRICING_DEFAULT_EXPLANATION"]),
    ("logging.level", &["PWYC_LOGGING_LEVEL", "PWYC_LOG_LEVEL"]),
    ("logging.format", &["PWYC_LOGGING_FORMAT", "PWYC_LOG_FORMAT"]),
];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pricing: PricingConfigDefaults,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Name of the cookie carrying the storefront session id.
    pub session_cookie: String,
    /// Idle time after which a visitor session and its chosen prices are dropped.
    pub session_ttl_secs: u64,
}

/// Event-independent pricing defaults; per-event settings override these.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PricingConfigDefaults {
    pub currency: String,
    pub default_explanation: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Values set programmatically; these win over file and environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub currency: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file `{path}` is unreadable: {source}")]
    Unreadable { path: PathBuf, source: std::io::Error },
    #[error("config file `{path}` is not valid TOML: {source}")]
    Malformed { path: PathBuf, source: toml::de::Error },
    #[error("config file `{0}` does not exist")]
    NotFound(PathBuf),
    #[error("`${{{0}}}` refers to an unset environment variable")]
    UnsetVariable(String),
    #[error("config file contains a `${{` placeholder without a closing brace")]
    OpenPlaceholder,
    #[error("environment variable {var} has an unusable value `{value}`")]
    BadEnvValue { var: String, value: String },
    #[error("configuration validation failed: {0}")]
    Invalid(String),
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            session_cookie: "pwyc_session".to_string(),
            session_ttl_secs: 14 * 24 * 60 * 60,
        }
    }
}

impl Default for PricingConfigDefaults {
    fn default() -> Self {
        Self { currency: "EUR".to_string(), default_explanation: String::new() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid(format!(
                "logging.format `{other}` is not one of compact, pretty or json"
            ))),
        }
    }
}

impl AppConfig {
    /// Layers defaults, the config file, `PWYC_*` variables and `options.overrides`,
    /// then validates.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let LoadOptions { config_path, require_file, overrides } = options;

        let mut config = match locate_file(config_path.as_deref()) {
            Some(path) => Self::from_file(&path)?,
            None if require_file => {
                return Err(ConfigError::NotFound(
                    config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0])),
                ));
            }
            None => Self::default(),
        };

        for (key_path, vars) in ENV_BINDINGS {
            if let Some((var, value)) = first_set(vars) {
                config.assign(key_path, var, value)?;
            }
        }
        config.apply_overrides(overrides);
        config.validate()?;

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ConfigError::Unreadable { path: path.to_path_buf(), source })?;
        toml::from_str(&expand_placeholders(&raw)?)
            .map_err(|source| ConfigError::Malformed { path: path.to_path_buf(), source })
    }

    fn assign(&mut self, key_path: &str, var: &str, value: String) -> Result<(), ConfigError> {
        match key_path {
            "server.bind_address" => self.server.bind_address = value,
            "server.port" => self.server.port = parse_number(var, &value)?,
            "server.session_cookie" => self.server.session_cookie = value,
            "server.session_ttl_secs" => {
                self.server.session_ttl_secs = parse_number(var, &value)?;
            }
            "pricing.currency" => self.pricing.currency = value,
            "pricing.default_explanation" => self.pricing.default_explanation = value,
            "logging.level" => self.logging.level = value,
            "logging.format" => self.logging.format = value.parse()?,
            _ => {}
        }
        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides { bind_address, port, log_level, currency } = overrides;
        if let Some(bind_address) = bind_address {
            self.server.bind_address = bind_address;
        }
        self.server.port = port.unwrap_or(self.server.port);
        if let Some(level) = log_level {
            self.logging.level = level;
        }
        if let Some(currency) = currency {
            self.pricing.currency = currency;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cookie = &self.server.session_cookie;
        let currency = &self.pricing.currency;
        let level = self.logging.level.trim().to_ascii_lowercase();

        if self.server.bind_address.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind_address is empty".to_string()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be greater than zero".to_string()));
        }
        if self.server.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.session_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if cookie.is_empty()
            || !cookie.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-'))
        {
            return Err(ConfigError::Invalid(format!(
                "server.session_cookie `{cookie}` must be non-empty and use only [A-Za-z0-9_-]"
            )));
        }
        if currency.len() != 3 || !currency.chars().all(|ch| ch.is_ascii_uppercase()) {
            return Err(ConfigError::Invalid(format!(
                "pricing.currency must be a three-letter ISO 4217 code, got `{currency}`"
            )));
        }
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level `{}` is not one of {}",
                self.logging.level,
                LOG_LEVELS.join("|")
            )));
        }

        Ok(())
    }
}

fn locate_file(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => path.is_file().then(|| path.to_path_buf()),
        None => DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).find(|path| path.is_file()),
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::BadEnvValue {
        var: var.to_string(),
        value: value.to_string(),
    })
}

/// First variable in `vars` holding a non-blank value.
fn first_set(vars: &[&'static str]) -> Option<(&'static str, String)> {
    vars.iter().find_map(|var| {
        env::var(var).ok().filter(|value| !value.trim().is_empty()).map(|value| (*var, value))
    })
}

/// Replaces every `${NAME}` with the value of the environment variable `NAME`.
fn expand_placeholders(raw: &str) -> Result<String, ConfigError> {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(ConfigError::OpenPlaceholder)?;
        let name = &tail[..end];
        let value = env::var(name).map_err(|_| ConfigError::UnsetVariable(name.to_string()))?;
        expanded.push_str(&value);
        rest = &tail[end + 1..];
    }
    expanded.push_str(rest);

    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    use tempfile::TempDir;

    use super::{
        expand_placeholders, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
        ENV_BINDINGS,
    };

    fn clean_env() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let guard = LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (_, vars) in ENV_BINDINGS {
            for var in vars {
                env::remove_var(var);
            }
        }
        guard
    }

    fn write_config(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("pwyc.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    fn without_file() -> LoadOptions {
        LoadOptions { config_path: Some("does-not-exist.toml".into()), ..LoadOptions::default() }
    }

    #[test]
    fn defaults_load_without_a_file() {
        let _env = clean_env();

        let config = AppConfig::load(without_file()).expect("defaults");

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.session_cookie, "pwyc_session");
        assert_eq!(config.server.session_ttl_secs, 1_209_600);
        assert_eq!(config.pricing.currency, "EUR");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let _env = clean_env();
        env::set_var("TEST_PWYC_EXPLANATION", "Pay what feels fair");
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            "[pricing]\ncurrency = \"USD\"\ndefault_explanation = \"${TEST_PWYC_EXPLANATION}\"\n",
        );

        let config =
            AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        env::remove_var("TEST_PWYC_EXPLANATION");
        let config = config.expect("file config");

        assert_eq!(config.pricing.currency, "USD");
        assert_eq!(config.pricing.default_explanation, "Pay what feels fair");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn overrides_beat_env_which_beats_file() {
        let _env = clean_env();
        env::set_var("PWYC_SERVER_PORT", "9000");
        env::set_var("PWYC_LOG_FORMAT", "json");
        let dir = TempDir::new().expect("tempdir");
        let path = write_config(
            &dir,
            "[server]\nport = 7000\nbind_address = \"0.0.0.0\"\n\n[logging]\nlevel = \"warn\"\n",
        );

        let config = AppConfig::load(LoadOptions {
            config_path: Some(path),
            overrides: ConfigOverrides {
                log_level: Some("debug".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        env::remove_var("PWYC_SERVER_PORT");
        env::remove_var("PWYC_LOG_FORMAT");
        let config = config.expect("layered config");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn lowercase_currency_is_rejected() {
        let _env = clean_env();

        let error = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                currency: Some("euro".to_string()),
                ..ConfigOverrides::default()
            },
            ..without_file()
        })
        .expect_err("currency must be rejected");

        assert!(matches!(
            error,
            ConfigError::Invalid(ref message) if message.contains("pricing.currency")
        ));
    }

    #[test]
    fn non_numeric_env_port_names_the_variable() {
        let _env = clean_env();
        env::set_var("PWYC_SERVER_PORT", "eighty");

        let result = AppConfig::load(without_file());
        env::remove_var("PWYC_SERVER_PORT");

        assert!(matches!(
            result,
            Err(ConfigError::BadEnvValue { ref var, .. }) if var == "PWYC_SERVER_PORT"
        ));
    }

    #[test]
    fn session_ttl_comes_from_env_and_must_be_positive() {
        let _env = clean_env();
        env::set_var("PWYC_SERVER_SESSION_TTL_SECS", "900");
        let configured = AppConfig::load(without_file());
        env::set_var("PWYC_SERVER_SESSION_TTL_SECS", "0");
        let zero = AppConfig::load(without_file());
        env::remove_var("PWYC_SERVER_SESSION_TTL_SECS");

        assert_eq!(configured.expect("ttl config").server.session_ttl_secs, 900);
        assert!(matches!(
            zero,
            Err(ConfigError::Invalid(ref message)) if message.contains("session_ttl_secs")
        ));
    }

    #[test]
    fn required_file_must_exist() {
        let _env = clean_env();

        let result = AppConfig::load(LoadOptions { require_file: true, ..without_file() });

        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn placeholders_expand_and_report_errors() {
        let _env = clean_env();
        env::set_var("TEST_PWYC_CURRENCY", "GBP");

        let expanded = expand_placeholders("currency = \"${TEST_PWYC_CURRENCY}\"");
        let unset = expand_placeholders("x = \"${TEST_PWYC_NEVER_SET}\"");
        let open = expand_placeholders("x = \"${TEST_PWYC_CURRENCY\"");
        env::remove_var("TEST_PWYC_CURRENCY");

        assert_eq!(expanded.expect("expanded"), "currency = \"GBP\"");
        assert!(matches!(
            unset,
            Err(ConfigError::UnsetVariable(ref name)) if name == "TEST_PWYC_NEVER_SET"
        ));
        assert!(matches!(open, Err(ConfigError::OpenPlaceholder)));
    }
}
