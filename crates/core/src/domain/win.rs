use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinFactorKind {
    MarginHealth,
    CustomerRelationship,
    QuoteVelocity,
    ProductFit,
    DiscountDepth,
}

impl WinFactorKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MarginHealth => "Margin Health",
            Self::CustomerRelationship => "Customer Relationship",
            Self::QuoteVelocity => "Quote Velocity",
            Self::ProductFit => "Product Fit",
            Self::DiscountDepth => "Discount Depth",
        }
    }
}

impl fmt::Display for WinFactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinFactor {
    pub factor: WinFactorKind,
    pub impact: i32,
    pub description: String,
}

/// Stored explanation of a win-probability score.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinAnalysis {
    pub score: u8,
    pub factors: Vec<WinFactor>,
    pub calculated_at: DateTime<Utc>,
}

impl WinAnalysis {
    pub fn factor(&self, kind: WinFactorKind) -> Option<&WinFactor> {
        self.factors.iter().find(|factor| factor.factor == kind)
    }
}
