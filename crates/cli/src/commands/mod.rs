pub mod config;
pub mod price;
pub mod score;
pub mod smoke;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use landquote_core::config::ConfigError;
use landquote_core::errors::{ApplicationError, InterfaceError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_BAD_REQUEST: u8 = 3;
pub const EXIT_CONFLICT: u8 = 4;
pub const EXIT_NOT_FOUND: u8 = 5;
pub const EXIT_SMOKE_FAILED: u8 = 6;
pub const EXIT_UNAVAILABLE: u8 = 7;
pub const EXIT_INTERNAL: u8 = 1;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Serializes `report` as the payload. A report that cannot be rendered
    /// is an internal failure, never an `ok` without data.
    pub fn success_with_report<T: Serialize>(
        command: &str,
        message: impl Into<String>,
        report: &T,
    ) -> Self {
        match serde_json::to_value(report) {
            Ok(data) => Self::success_with_data(command, message, Some(data)),
            Err(error) => {
                warn!(
                    event_name = "cli.report_serialization_failed",
                    command,
                    error = %error,
                    "command report could not be serialized"
                );
                Self::failure(
                    command,
                    "internal",
                    format!("could not serialize {command} report: {error}"),
                    EXIT_INTERNAL,
                )
            }
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            correlation_id: None,
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    pub fn config_failure(command: &str, error: &ConfigError) -> Self {
        Self::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    }

    /// Maps an application failure onto the caller-facing error classes.
    pub fn from_application_error(command: &str, error: ApplicationError) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        let detail = error.to_string();
        let interface = error.into_interface(correlation_id.clone());
        let (error_class, exit_code) = match interface {
            InterfaceError::BadRequest { .. } => ("bad_request", EXIT_BAD_REQUEST),
            InterfaceError::Conflict { .. } => ("conflict", EXIT_CONFLICT),
            InterfaceError::NotFound { .. } => ("not_found", EXIT_NOT_FOUND),
            InterfaceError::ServiceUnavailable { .. } => ("service_unavailable", EXIT_UNAVAILABLE),
            InterfaceError::Internal { .. } => ("internal", EXIT_INTERNAL),
        };
        warn!(
            event_name = "cli.command_failed",
            command,
            error_class,
            correlation_id = %correlation_id,
            "{detail}"
        );

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: format!("{} ({detail})", interface.user_message()),
            correlation_id: Some(correlation_id),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read input file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("input file `{}` is not valid JSON for this command", path.display()))
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
