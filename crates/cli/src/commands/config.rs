use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use landquote_core::config::{AppConfig, LoadOptions, LogFormat};
use toml::Value;

struct ConfigField {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let fields = [
        ConfigField {
            key: "pricing.vat_rate",
            value: config.pricing.vat_rate.to_string(),
            env_keys: &["LANDQUOTE_VAT_RATE"],
        },
        ConfigField {
            key: "pricing.quote_validity_days",
            value: config.pricing.quote_validity_days.to_string(),
            env_keys: &["LANDQUOTE_QUOTE_VALIDITY_DAYS"],
        },
        ConfigField {
            key: "pricing.low_margin_threshold",
            value: config.pricing.low_margin_threshold.to_string(),
            env_keys: &["LANDQUOTE_LOW_MARGIN_THRESHOLD"],
        },
        ConfigField {
            key: "pricing.critical_margin_threshold",
            value: config.pricing.critical_margin_threshold.to_string(),
            env_keys: &["LANDQUOTE_CRITICAL_MARGIN_THRESHOLD"],
        },
        ConfigField {
            key: "pricing.smart_approval_floor",
            value: config.pricing.smart_approval_floor.to_string(),
            env_keys: &["LANDQUOTE_SMART_APPROVAL_FLOOR"],
        },
        ConfigField {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["LANDQUOTE_LOGGING_LEVEL", "LANDQUOTE_LOG_LEVEL"],
        },
        ConfigField {
            key: "logging.format",
            value: render_format(config.logging.format).to_string(),
            env_keys: &["LANDQUOTE_LOGGING_FORMAT", "LANDQUOTE_LOG_FORMAT"],
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    lines.join("\n")
}

fn render_format(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Compact => "compact",
        LogFormat::Pretty => "pretty",
        LogFormat::Json => "json",
    }
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("landquote.toml"), PathBuf::from("config/landquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys
        .iter()
        .find(|env_key| env::var(env_key).is_ok_and(|value| !value.trim().is_empty()))
    {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
