use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::quote::{QuoteId, QuoteStatus};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalQuote {
    pub quote_id: QuoteId,
    pub status: QuoteStatus,
}

/// Prior quotes raised for one customer, as reported by persistence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerHistory {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub quotes: Vec<HistoricalQuote>,
}

impl CustomerHistory {
    pub fn new(customer_id: CustomerId) -> Self {
        Self { customer_id, quotes: Vec::new() }
    }

    pub fn with_quote(mut self, quote_id: QuoteId, status: QuoteStatus) -> Self {
        self.quotes.push(HistoricalQuote { quote_id, status });
        self
    }

    pub fn has_accepted_quote_other_than(&self, quote_id: &QuoteId) -> bool {
        self.quotes
            .iter()
            .any(|entry| entry.status == QuoteStatus::Accepted && &entry.quote_id != quote_id)
    }
}
