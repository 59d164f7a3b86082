use std::env;
use std::fs;
use std::path::PathBuf;

use pwyc_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_PATHS, ENV_BINDINGS};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };
    let file = FileLayer::discover();

    let header = "effective config (source precedence: env > file > default):".to_string();
    let lines = ENV_BINDINGS.into_iter().map(|(key_path, env_keys)| {
        format!(
            "- {key_path} = {} (source: {})",
            effective_value(&config, key_path),
            attribute(key_path, env_keys, file.as_ref())
        )
    });

    std::iter::once(header).chain(lines).collect::<Vec<_>>().join("\n")
}

/// The config file that `AppConfig::load` would pick up, parsed as untyped TOML.
struct FileLayer {
    path: PathBuf,
    table: Value,
}

impl FileLayer {
    fn discover() -> Option<Self> {
        let path = DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from).find(|path| path.is_file())?;
        let table = fs::read_to_string(&path).ok()?.parse::<Value>().ok()?;
        Some(Self { path, table })
    }

    fn defines(&self, key_path: &str) -> bool {
        key_path.split('.').try_fold(&self.table, |node, segment| node.get(segment)).is_some()
    }
}

fn attribute(key_path: &str, env_keys: &[&str], file: Option<&FileLayer>) -> String {
    let is_set = |key: &&&str| env::var(key).is_ok_and(|value| !value.trim().is_empty());
    match (env_keys.iter().find(is_set), file) {
        (Some(var), _) => format!("env ({var})"),
        (None, Some(file)) if file.defines(key_path) => format!("file ({})", file.path.display()),
        (None, _) => "default".to_string(),
    }
}

fn effective_value(config: &AppConfig, key_path: &str) -> String {
    match key_path {
        "server.bind_address" => config.server.bind_address.clone(),
        "server.port" => config.server.port.to_string(),
        "server.session_cookie" => config.server.session_cookie.clone(),
        "server.session_ttl_secs" => config.server.session_ttl_secs.to_string(),
        "pricing.currency" => config.pricing.currency.clone(),
        "pricing.default_explanation" if config.pricing.default_explanation.is_empty() => {
            "<unset>".to_string()
        }
        "pricing.default_explanation" => format!("{:?}", config.pricing.default_explanation),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format),
        _ => "<unknown>".to_string(),
    }
}
