use serde::{Deserialize, Serialize};

use crate::domain::quote::QuoteId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionStep {
    Lines,
    RevisionHistory,
    QuoteRecord,
}

/// Children-first removal order for one quote. A store that stops part way
/// leaves the quote record in place rather than orphaned lines or revisions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionPlan {
    pub quote_id: QuoteId,
    pub steps: Vec<DeletionStep>,
}

pub fn deletion_plan(quote_id: &QuoteId) -> DeletionPlan {
    DeletionPlan {
        quote_id: quote_id.clone(),
        steps: vec![DeletionStep::Lines, DeletionStep::RevisionHistory, DeletionStep::QuoteRecord],
    }
}
