use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cpq::totals::QuoteTotals;
use crate::domain::quote::{QuoteId, QuoteLine, QuoteStatus, UserId};

/// Snapshot of a quote's line set taken just before an edit replaced it.
/// Revisions are append-only; nothing rewrites a recorded snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRevision {
    pub quote_id: QuoteId,
    pub revision_number: u32,
    pub status_before: QuoteStatus,
    pub lines: Vec<QuoteLine>,
    pub totals: QuoteTotals,
    pub edited_by: UserId,
    pub recorded_at: DateTime<Utc>,
}
