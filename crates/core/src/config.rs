use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rates::{MarginThresholds, RateResolver, RateSnapshot};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AppConfig {
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

/// Administrator-managed pricing settings. Read-only to the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PricingConfig {
    pub vat_rate: Decimal,
    pub quote_validity_days: u32,
    pub low_margin_threshold: Decimal,
    pub critical_margin_threshold: Decimal,
    pub smart_approval_floor: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
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

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub vat_rate: Option<Decimal>,
    pub quote_validity_days: Option<u32>,
    pub smart_approval_floor: Option<Decimal>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for PricingConfig {
    fn default() -> Self {
        let rates = RateSnapshot::default();
        Self {
            vat_rate: rates.vat_rate,
            quote_validity_days: rates.quote_validity_days,
            low_margin_threshold: rates.margin_thresholds.low_margin,
            critical_margin_threshold: rates.margin_thresholds.critical_margin,
            smart_approval_floor: rates.margin_thresholds.smart_approval_floor,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl RateResolver for PricingConfig {
    fn resolve(&self) -> RateSnapshot {
        RateSnapshot {
            vat_rate: self.vat_rate,
            quote_validity_days: self.quote_validity_days,
            margin_thresholds: MarginThresholds {
                low_margin: self.low_margin_threshold,
                critical_margin: self.critical_margin_threshold,
                smart_approval_floor: self.smart_approval_floor,
            },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("landquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(pricing) = patch.pricing {
            if let Some(value) = pricing.vat_rate {
                self.pricing.vat_rate = value.into_decimal("pricing.vat_rate")?;
            }
            if let Some(value) = pricing.quote_validity_days {
                self.pricing.quote_validity_days = value;
            }
            if let Some(value) = pricing.low_margin_threshold {
                self.pricing.low_margin_threshold =
                    value.into_decimal("pricing.low_margin_threshold")?;
            }
            if let Some(value) = pricing.critical_margin_threshold {
                self.pricing.critical_margin_threshold =
                    value.into_decimal("pricing.critical_margin_threshold")?;
            }
            if let Some(value) = pricing.smart_approval_floor {
                self.pricing.smart_approval_floor =
                    value.into_decimal("pricing.smart_approval_floor")?;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LANDQUOTE_VAT_RATE") {
            self.pricing.vat_rate = parse_decimal("LANDQUOTE_VAT_RATE", &value)?;
        }
        if let Some(value) = read_env("LANDQUOTE_QUOTE_VALIDITY_DAYS") {
            self.pricing.quote_validity_days = parse_u32("LANDQUOTE_QUOTE_VALIDITY_DAYS", &value)?;
        }
        if let Some(value) = read_env("LANDQUOTE_LOW_MARGIN_THRESHOLD") {
            self.pricing.low_margin_threshold =
                parse_decimal("LANDQUOTE_LOW_MARGIN_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("LANDQUOTE_CRITICAL_MARGIN_THRESHOLD") {
            self.pricing.critical_margin_threshold =
                parse_decimal("LANDQUOTE_CRITICAL_MARGIN_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("LANDQUOTE_SMART_APPROVAL_FLOOR") {
            self.pricing.smart_approval_floor =
                parse_decimal("LANDQUOTE_SMART_APPROVAL_FLOOR", &value)?;
        }

        let log_level =
            read_env("LANDQUOTE_LOGGING_LEVEL").or_else(|| read_env("LANDQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LANDQUOTE_LOGGING_FORMAT").or_else(|| read_env("LANDQUOTE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(vat_rate) = overrides.vat_rate {
            self.pricing.vat_rate = vat_rate;
        }
        if let Some(days) = overrides.quote_validity_days {
            self.pricing.quote_validity_days = days;
        }
        if let Some(floor) = overrides.smart_approval_floor {
            self.pricing.smart_approval_floor = floor;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_pricing(&self.pricing)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("landquote.toml"), PathBuf::from("config/landquote.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    if pricing.vat_rate < Decimal::ZERO || pricing.vat_rate > Decimal::ONE {
        return Err(ConfigError::Validation(
            "pricing.vat_rate must be a ratio in range 0..=1 (e.g. 0.15 for 15%)".to_string(),
        ));
    }

    if pricing.quote_validity_days == 0 || pricing.quote_validity_days > 365 {
        return Err(ConfigError::Validation(
            "pricing.quote_validity_days must be in range 1..=365".to_string(),
        ));
    }

    if pricing.critical_margin_threshold < Decimal::ZERO
        || pricing.critical_margin_threshold > pricing.low_margin_threshold
        || pricing.low_margin_threshold > Decimal::ONE
    {
        return Err(ConfigError::Validation(
            "margin thresholds must satisfy 0 <= pricing.critical_margin_threshold <= pricing.low_margin_threshold <= 1"
                .to_string(),
        ));
    }

    if pricing.smart_approval_floor < Decimal::ZERO || pricing.smart_approval_floor > Decimal::ONE
    {
        return Err(ConfigError::Validation(
            "pricing.smart_approval_floor must be a ratio in range 0..=1".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_decimal(key: &str, value: &str) -> Result<Decimal, ConfigError> {
    Decimal::from_str(value.trim()).map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// TOML ratios may be written as `0.15` or `"0.15"`. Floats are parsed from
/// their shortest decimal rendering so `0.15` stays exactly `0.15`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatchDecimal {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl PatchDecimal {
    fn into_decimal(self, key: &str) -> Result<Decimal, ConfigError> {
        match self {
            Self::Integer(value) => Ok(Decimal::from(value)),
            Self::Float(value) => parse_decimal(key, &value.to_string()),
            Self::Text(value) => parse_decimal(key, &value),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    pricing: Option<PricingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    vat_rate: Option<PatchDecimal>,
    quote_validity_days: Option<u32>,
    low_margin_threshold: Option<PatchDecimal>,
    critical_margin_threshold: Option<PatchDecimal>,
    smart_approval_floor: Option<PatchDecimal>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
