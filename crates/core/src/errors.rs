use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::quote::{QuoteId, QuoteStatus};

/// Quote operations that are guarded by the status machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteOperation {
    Submit,
    Approve,
    Reject,
    Edit,
    Amend,
    Accept,
}

impl QuoteOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submit => "submit",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Edit => "edit",
            Self::Amend => "amend",
            Self::Accept => "accept",
        }
    }
}

impl fmt::Display for QuoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidState,
    EmptyQuote,
    NotFound,
}

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoreError {
    #[error("invalid input for `{field}`{}: {message}", line_suffix(.line_index))]
    InvalidInput { field: String, message: String, line_index: Option<usize> },
    #[error("cannot {operation} a quote in `{current}` state")]
    InvalidState { operation: QuoteOperation, current: QuoteStatus },
    #[error("quote {quote_id} has no lines")]
    EmptyQuote { quote_id: QuoteId },
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: String, id: String },
}

fn line_suffix(line_index: &Option<usize>) -> String {
    line_index.map(|index| format!(" on line {}", index + 1)).unwrap_or_default()
}

impl CoreError {
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput { field: field.into(), message: message.into(), line_index: None }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound { entity: entity.into(), id: id.into() }
    }

    /// Tags an input error with the position of the offending line.
    pub fn at_line(self, index: usize) -> Self {
        match self {
            Self::InvalidInput { field, message, .. } => {
                Self::InvalidInput { field, message, line_index: Some(index) }
            }
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::EmptyQuote { .. } => ErrorKind::EmptyQuote,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Conflict { .. } => {
                "The quote is not in a state that allows this action. Refresh and try again."
            }
            Self::NotFound { .. } => "The requested quote could not be found.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let message = self.to_string();
        match self {
            Self::Core(error) => match error.kind() {
                ErrorKind::InvalidInput | ErrorKind::EmptyQuote => {
                    InterfaceError::BadRequest { message, correlation_id }
                }
                ErrorKind::InvalidState => InterfaceError::Conflict { message, correlation_id },
                ErrorKind::NotFound => InterfaceError::NotFound { message, correlation_id },
            },
            Self::Persistence(_) => InterfaceError::ServiceUnavailable { message, correlation_id },
            Self::Configuration(_) => InterfaceError::Internal { message, correlation_id },
        }
    }
}
