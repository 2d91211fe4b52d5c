//! Landed-cost pricing: per-line calculation and quote-level totals.

pub mod pricing;
pub mod totals;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::CoreError;

pub use pricing::{calculate_line, calculate_lines};
pub use totals::{aggregate, MarginHealth, QuoteTotals};

/// Decimal places kept on unit-level money and ratio fields.
pub const UNIT_SCALE: u32 = 4;
/// Decimal places kept on line and quote totals.
pub const TOTAL_SCALE: u32 = 2;

/// Half-up rounding for unit-level fields (landed cost, markup, unit sell).
pub fn round_unit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Half-up rounding for totals.
pub fn round_total(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(TOTAL_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Overflow on any money step is an input error rather than a panic.
pub(crate) fn in_range(value: Option<Decimal>, field: &str) -> Result<Decimal, CoreError> {
    value.ok_or_else(|| CoreError::invalid_input(field, "amount exceeds supported range"))
}

/// Renders a ratio such as `0.3250` as `32.50%`.
pub fn format_percent(ratio: Decimal) -> String {
    let percent = ratio
        .saturating_mul(Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{percent:.2}%")
}
