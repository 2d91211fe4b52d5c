use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::{in_range, round_total, round_unit};
use crate::domain::quote::QuoteLine;
use crate::errors::CoreError;
use crate::rates::MarginThresholds;

/// Quote-level rollup of calculated lines.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub line_count: usize,
    pub total_landed_cost: Decimal,
    pub total_markup: Decimal,
    pub total_selling_ex_vat: Decimal,
    pub total_vat: Decimal,
    pub total_selling_inc_vat: Decimal,
    /// Gross margin on the selling price, not markup on cost.
    pub overall_gm_percent: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginHealth {
    Healthy,
    Low,
    Critical,
}

impl QuoteTotals {
    pub fn margin_health(&self, thresholds: &MarginThresholds) -> MarginHealth {
        if self.overall_gm_percent < thresholds.critical_margin {
            MarginHealth::Critical
        } else if self.overall_gm_percent < thresholds.low_margin {
            MarginHealth::Low
        } else {
            MarginHealth::Healthy
        }
    }
}

/// Rolls calculated lines up into quote totals. Sums that leave the
/// `Decimal` range fail as `InvalidInput` on the `lines` field.
pub fn aggregate(lines: &[QuoteLine]) -> Result<QuoteTotals, CoreError> {
    let mut landed_cost = Decimal::ZERO;
    let mut markup = Decimal::ZERO;
    let mut selling_ex_vat = Decimal::ZERO;
    let mut vat = Decimal::ZERO;
    let mut selling_inc_vat = Decimal::ZERO;

    for line in lines {
        let breakdown = line.breakdown();
        let quantity = Decimal::from(line.quantity());
        landed_cost = add_weighted(landed_cost, breakdown.landed_cost, quantity)?;
        markup = add_weighted(markup, breakdown.markup_amount, quantity)?;
        selling_ex_vat = add(selling_ex_vat, breakdown.line_total_ex_vat)?;
        vat = add(vat, breakdown.vat_amount)?;
        selling_inc_vat = add(selling_inc_vat, breakdown.line_total_inc_vat)?;
    }

    let total_landed_cost = round_total(landed_cost);
    let total_selling_ex_vat = round_total(selling_ex_vat);
    let overall_gm_percent = if total_selling_ex_vat > Decimal::ZERO {
        round_unit(in_range(
            total_selling_ex_vat
                .checked_sub(total_landed_cost)
                .and_then(|margin| margin.checked_div(total_selling_ex_vat)),
            "lines",
        )?)
    } else {
        Decimal::ZERO
    };

    Ok(QuoteTotals {
        line_count: lines.len(),
        total_landed_cost,
        total_markup: round_total(markup),
        total_selling_ex_vat,
        total_vat: round_total(vat),
        total_selling_inc_vat: round_total(selling_inc_vat),
        overall_gm_percent,
    })
}

fn add(sum: Decimal, amount: Decimal) -> Result<Decimal, CoreError> {
    in_range(sum.checked_add(amount), "lines")
}

fn add_weighted(sum: Decimal, unit: Decimal, quantity: Decimal) -> Result<Decimal, CoreError> {
    in_range(unit.checked_mul(quantity).and_then(|amount| sum.checked_add(amount)), "lines")
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{aggregate, MarginHealth, QuoteTotals};
    use crate::cpq::pricing::{calculate_line, calculate_lines};
    use crate::domain::quote::{LineInput, QuoteLine};
    use crate::errors::CoreError;
    use crate::rates::MarginThresholds;

    fn sample_lines() -> Vec<QuoteLine> {
        let inputs = vec![
            LineInput::new(Decimal::new(100, 0), "USD", 3, Decimal::new(185, 1)).with_rates(
                Decimal::new(10, 2),
                Decimal::new(20, 2),
                Decimal::new(5, 2),
            ),
            LineInput::new(Decimal::new(26_358, 2), "EUR", 1, Decimal::new(72, 2))
                .with_rates(Decimal::new(5, 2), Decimal::ZERO, Decimal::ZERO)
                .with_override_markup(Decimal::ZERO),
        ];
        calculate_lines(&inputs, Decimal::new(15, 2)).expect("valid lines")
    }

    #[test]
    fn empty_input_yields_zero_totals() {
        let totals = aggregate(&[]).expect("empty totals");

        assert_eq!(totals, QuoteTotals::default());
        assert_eq!(totals.line_count, 0);
        assert_eq!(totals.overall_gm_percent, Decimal::ZERO);
    }

    #[test]
    fn sums_lines_weighted_by_quantity() {
        let totals = aggregate(&sample_lines()).expect("totals");

        assert_eq!(totals.line_count, 2);
        // 2564.1 × 3 + 199.2665
        assert_eq!(totals.total_landed_cost, Decimal::new(789_157, 2));
        // 641.025 × 3, half-up
        assert_eq!(totals.total_markup, Decimal::new(192_308, 2));
        assert_eq!(totals.total_selling_ex_vat, Decimal::new(981_465, 2));
        assert_eq!(totals.total_vat, Decimal::new(147_220, 2));
        assert_eq!(totals.total_selling_inc_vat, Decimal::new(1_128_685, 2));
        // (9814.65 - 7891.57) / 9814.65
        assert_eq!(totals.overall_gm_percent, Decimal::new(1_959, 4));
    }

    #[test]
    fn gross_margin_is_on_selling_price_not_cost() {
        let line = calculate_line(
            &LineInput::new(Decimal::new(100, 0), "USD", 1, Decimal::ONE),
            Decimal::new(15, 2),
        )
        .expect("valid line");

        let totals = aggregate(&[line]).expect("totals");

        // 25% markup on cost is a 20% margin on the selling price
        assert_eq!(totals.overall_gm_percent, Decimal::new(2_000, 4));
    }

    #[test]
    fn aggregation_is_order_independent_and_idempotent() {
        let lines = sample_lines();
        let mut reversed = lines.clone();
        reversed.reverse();

        let first = aggregate(&lines).expect("totals");
        assert_eq!(Ok(first.clone()), aggregate(&reversed));
        assert_eq!(Ok(first), aggregate(&lines));
    }

    #[test]
    fn zero_priced_lines_report_zero_margin() {
        let line = calculate_line(
            &LineInput::new(Decimal::ZERO, "USD", 4, Decimal::ONE),
            Decimal::new(15, 2),
        )
        .expect("valid line");

        let totals = aggregate(&[line]).expect("totals");

        assert_eq!(totals.line_count, 1);
        assert_eq!(totals.overall_gm_percent, Decimal::ZERO);
    }

    #[test]
    fn sums_beyond_decimal_range_are_rejected() {
        // each line alone stays in range, together they do not
        let big = Decimal::from_i128_with_scale(10i128.pow(27), 0);
        let line = calculate_line(&LineInput::new(big, "USD", 5, Decimal::ONE), Decimal::ZERO)
            .expect("single line fits");
        let lines = vec![line; 20];

        let error = aggregate(&lines).expect_err("sum overflows");

        assert!(matches!(
            error,
            CoreError::InvalidInput { ref field, ref message, .. }
                if field == "lines" && message == "amount exceeds supported range"
        ));
    }

    #[test]
    fn margin_health_uses_configured_thresholds() {
        let thresholds = MarginThresholds::default();
        let totals = |gm: i64| QuoteTotals {
            overall_gm_percent: Decimal::new(gm, 4),
            ..QuoteTotals::default()
        };

        assert_eq!(totals(2_500).margin_health(&thresholds), MarginHealth::Healthy);
        assert_eq!(totals(2_000).margin_health(&thresholds), MarginHealth::Healthy);
        assert_eq!(totals(1_999).margin_health(&thresholds), MarginHealth::Low);
        assert_eq!(totals(999).margin_health(&thresholds), MarginHealth::Critical);
    }
}
