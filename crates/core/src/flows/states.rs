use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteStatus;
use crate::errors::QuoteOperation;

/// Who is replacing a quote's lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditAuthority {
    /// The quote's owner; limited to draft and rejected quotes.
    #[default]
    Owner,
    /// Administrative bypass; may edit in any status.
    Elevated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QuoteEvent {
    Submit { requires_approval: bool },
    Approve,
    Reject,
    Edit { authority: EditAuthority },
    Amend,
    Accept,
}

impl QuoteEvent {
    pub fn operation(&self) -> QuoteOperation {
        match self {
            Self::Submit { .. } => QuoteOperation::Submit,
            Self::Approve => QuoteOperation::Approve,
            Self::Reject => QuoteOperation::Reject,
            Self::Edit { .. } => QuoteOperation::Edit,
            Self::Amend => QuoteOperation::Amend,
            Self::Accept => QuoteOperation::Accept,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: QuoteStatus,
    pub to: QuoteStatus,
    pub event: QuoteEvent,
}

impl TransitionOutcome {
    pub fn changed_status(&self) -> bool {
        self.from != self.to
    }
}
