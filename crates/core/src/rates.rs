//! Effective rates and thresholds, resolved once per operation.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginThresholds {
    /// Margins below this are reported as low.
    pub low_margin: Decimal,
    /// Margins below this are reported as critical.
    pub critical_margin: Decimal,
    /// Submitted quotes at or above this margin skip human review.
    pub smart_approval_floor: Decimal,
}

impl Default for MarginThresholds {
    fn default() -> Self {
        Self {
            low_margin: Decimal::new(20, 2),
            critical_margin: Decimal::new(10, 2),
            smart_approval_floor: Decimal::new(15, 2),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub vat_rate: Decimal,
    pub quote_validity_days: u32,
    pub margin_thresholds: MarginThresholds,
}

impl Default for RateSnapshot {
    fn default() -> Self {
        Self {
            vat_rate: Decimal::new(15, 2),
            quote_validity_days: 30,
            margin_thresholds: MarginThresholds::default(),
        }
    }
}

/// Source of the configuration values pricing and approval read.
///
/// Implementations are queried at the start of every operation and must not
/// be cached by callers, so an administrator's change applies to the next
/// calculation or submission.
pub trait RateResolver: Send + Sync {
    fn resolve(&self) -> RateSnapshot;

    fn vat_rate(&self) -> Decimal {
        self.resolve().vat_rate
    }

    fn quote_validity_days(&self) -> u32 {
        self.resolve().quote_validity_days
    }

    fn margin_thresholds(&self) -> MarginThresholds {
        self.resolve().margin_thresholds
    }
}

impl RateResolver for RateSnapshot {
    fn resolve(&self) -> RateSnapshot {
        self.clone()
    }
}

impl<T> RateResolver for Arc<T>
where
    T: RateResolver + ?Sized,
{
    fn resolve(&self) -> RateSnapshot {
        self.as_ref().resolve()
    }
}

impl<T> RateResolver for &T
where
    T: RateResolver + ?Sized,
{
    fn resolve(&self) -> RateSnapshot {
        (**self).resolve()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::{RateResolver, RateSnapshot};

    #[test]
    fn defaults_match_documented_values() {
        let rates = RateSnapshot::default();

        assert_eq!(rates.vat_rate(), Decimal::new(15, 2));
        assert_eq!(rates.quote_validity_days(), 30);
        assert_eq!(rates.margin_thresholds().smart_approval_floor, Decimal::new(15, 2));
        assert_eq!(rates.margin_thresholds().critical_margin, Decimal::new(10, 2));
    }

    #[test]
    fn shared_resolvers_delegate() {
        let shared: Arc<dyn RateResolver> =
            Arc::new(RateSnapshot { vat_rate: Decimal::new(20, 2), ..RateSnapshot::default() });

        assert_eq!(shared.vat_rate(), Decimal::new(20, 2));
    }
}
