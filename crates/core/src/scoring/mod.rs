//! Explainable win-probability heuristic.
//!
//! Each factor contributes a signed impact; the sum is clamped into
//! `0..=100`. The discount-depth factor reads the margin as a proxy for how
//! far the price was cut, since quotes do not record a list-price discount.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::cpq::format_percent;
use crate::domain::customer::CustomerHistory;
use crate::domain::product::{ProductCatalog, StockStatus};
use crate::domain::quote::Quote;
use crate::domain::win::{WinAnalysis, WinFactor, WinFactorKind};

/// Margin at which the margin factor reaches its full weight.
const FULL_MARGIN: Decimal = Decimal::from_parts(30, 0, 0, false, 2);
/// Margin at or below which the margin factor contributes nothing.
const ZERO_MARGIN: Decimal = Decimal::from_parts(10, 0, 0, false, 2);
const MARGIN_WEIGHT: i32 = 40;
/// Margins below this trigger the discount-depth check.
const DISCOUNT_MARGIN: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

const RETURNING_CUSTOMER_IMPACT: i32 = 20;
const NEW_CUSTOMER_IMPACT: i32 = -10;

const FAST_TURNAROUND_HOURS: i64 = 4;
const STALE_AFTER_HOURS: i64 = 24;
const FAST_TURNAROUND_IMPACT: i32 = 20;
const STALE_PENALTY_PER_DAY: i32 = 5;

const PRODUCT_FIT_IMPACT: i32 = 10;
const DISCOUNT_IMPACT: i32 = -10;

#[derive(Clone, Copy, Debug, Default)]
pub struct WinScorer;

impl WinScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(
        &self,
        quote: &Quote,
        customer_history: Option<&CustomerHistory>,
        catalog: &dyn ProductCatalog,
        now: DateTime<Utc>,
    ) -> WinAnalysis {
        let gm = quote.overall_gm_percent();
        let mut factors = vec![margin_factor(gm)];
        if quote.customer_id.is_some() {
            factors.push(customer_factor(quote, customer_history));
        }
        factors.push(velocity_factor(now - quote.created_at));
        if let Some(factor) = product_fit_factor(quote, catalog) {
            factors.push(factor);
        }
        if gm < DISCOUNT_MARGIN {
            factors.push(discount_factor(quote, gm));
        }

        let total: i64 = factors.iter().map(|factor| i64::from(factor.impact)).sum();
        let score = u8::try_from(total.clamp(0, 100)).unwrap_or(0);
        debug!(
            event_name = "quote.win_scored",
            quote_id = %quote.id,
            score,
            factor_count = factors.len(),
            "win probability calculated"
        );

        WinAnalysis { score, factors, calculated_at: now }
    }

    /// Scores `quote` and stores the analysis on it.
    pub fn score_and_record(
        &self,
        quote: &mut Quote,
        customer_history: Option<&CustomerHistory>,
        catalog: &dyn ProductCatalog,
        now: DateTime<Utc>,
    ) -> u8 {
        let analysis = self.score(quote, customer_history, catalog, now);
        let score = analysis.score;
        quote.record_win_analysis(analysis);
        score
    }
}

fn margin_factor(gm: Decimal) -> WinFactor {
    let impact = if gm >= FULL_MARGIN {
        MARGIN_WEIGHT
    } else if gm <= ZERO_MARGIN {
        0
    } else {
        let scaled = (gm - ZERO_MARGIN) / (FULL_MARGIN - ZERO_MARGIN) * Decimal::from(MARGIN_WEIGHT);
        scaled
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i32()
            .unwrap_or(0)
    };
    let band = if gm >= FULL_MARGIN {
        "strong"
    } else if gm <= ZERO_MARGIN {
        "thin"
    } else {
        "moderate"
    };

    WinFactor {
        factor: WinFactorKind::MarginHealth,
        impact,
        description: format!("Gross margin of {} is {band}", format_percent(gm)),
    }
}

fn customer_factor(quote: &Quote, history: Option<&CustomerHistory>) -> WinFactor {
    let returning = history.is_some_and(|history| history.has_accepted_quote_other_than(&quote.id));
    if returning {
        WinFactor {
            factor: WinFactorKind::CustomerRelationship,
            impact: RETURNING_CUSTOMER_IMPACT,
            description: "Customer has accepted previous quotes".to_owned(),
        }
    } else {
        WinFactor {
            factor: WinFactorKind::CustomerRelationship,
            impact: NEW_CUSTOMER_IMPACT,
            description: "New customer with no accepted quotes".to_owned(),
        }
    }
}

fn velocity_factor(age: Duration) -> WinFactor {
    let (impact, description) = if age <= Duration::hours(FAST_TURNAROUND_HOURS) {
        (FAST_TURNAROUND_IMPACT, "Quote turned around within 4 hours".to_owned())
    } else if age <= Duration::hours(STALE_AFTER_HOURS) {
        (0, "Quote is less than a day old".to_owned())
    } else {
        let day_ms = Duration::hours(STALE_AFTER_HOURS).num_milliseconds();
        let excess_ms = (age - Duration::hours(STALE_AFTER_HOURS)).num_milliseconds();
        let stale_days = (excess_ms + day_ms - 1) / day_ms;
        let impact = i32::try_from(stale_days)
            .unwrap_or(i32::MAX)
            .saturating_mul(-STALE_PENALTY_PER_DAY);
        (impact, format!("Quote has been open {} days", age.num_days()))
    };

    WinFactor { factor: WinFactorKind::QuoteVelocity, impact, description }
}

fn product_fit_factor(quote: &Quote, catalog: &dyn ProductCatalog) -> Option<WinFactor> {
    let statuses: Vec<StockStatus> = quote
        .lines()
        .iter()
        .filter_map(|line| line.part_number())
        .map(|part_number| catalog.stock_status(part_number).unwrap_or(StockStatus::Standard))
        .collect();
    if statuses.is_empty() {
        return None;
    }

    let total = statuses.len();
    let standard = statuses.iter().filter(|status| status.is_standard()).count();
    let custom = statuses.iter().filter(|status| status.is_custom()).count();

    let (impact, description) = if standard * 5 >= total * 4 {
        (PRODUCT_FIT_IMPACT, format!("{standard} of {total} parts are standard stock"))
    } else if custom * 5 > total {
        (-PRODUCT_FIT_IMPACT, format!("{custom} of {total} parts are custom or special order"))
    } else {
        (0, format!("Mixed availability across {total} parts"))
    };

    Some(WinFactor { factor: WinFactorKind::ProductFit, impact, description })
}

fn discount_factor(quote: &Quote, gm: Decimal) -> WinFactor {
    if quote.status.is_sanctioned() {
        WinFactor {
            factor: WinFactorKind::DiscountDepth,
            impact: 0,
            description: format!(
                "Margin of {} is low but the price has been approved",
                format_percent(gm)
            ),
        }
    } else {
        WinFactor {
            factor: WinFactorKind::DiscountDepth,
            impact: DISCOUNT_IMPACT,
            description: format!(
                "Margin of {} suggests a deep discount awaiting approval",
                format_percent(gm)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{margin_factor, velocity_factor, WinScorer};
    use crate::cpq::calculate_lines;
    use crate::domain::customer::{CustomerHistory, CustomerId};
    use crate::domain::product::StockStatus;
    use crate::domain::quote::{LineInput, Quote, QuoteId, QuoteStatus, UserId};
    use crate::domain::win::WinFactorKind;

    fn created_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).single().expect("valid timestamp")
    }

    fn quote_with(inputs: &[LineInput], customer: Option<&str>) -> Quote {
        let lines = calculate_lines(inputs, Decimal::new(15, 2)).expect("valid lines");
        Quote::new_draft(
            UserId("rep-1".to_owned()),
            customer.map(|id| CustomerId(id.to_owned())),
            lines,
            30,
            created_at(),
        )
        .expect("totals in range")
    }

    /// 100 landed at 42.86% markup sells at 142.86, a 30.00% margin.
    fn thirty_percent_line() -> LineInput {
        LineInput::new(Decimal::new(100, 0), "USD", 1, Decimal::ONE)
            .with_override_markup(Decimal::new(4_286, 4))
    }

    fn part(number: &str) -> LineInput {
        thirty_percent_line().with_part_number(number)
    }

    fn no_catalog() -> HashMap<String, StockStatus> {
        HashMap::new()
    }

    #[test]
    fn new_customer_with_strong_margin_scores_fifty() {
        let quote = quote_with(&[thirty_percent_line()], Some("acme"));
        assert_eq!(quote.overall_gm_percent(), Decimal::new(3_000, 4));
        let history = CustomerHistory::new(CustomerId("acme".to_owned()))
            .with_quote(QuoteId("Q-old".to_owned()), QuoteStatus::Rejected);

        let analysis = WinScorer::new().score(
            &quote,
            Some(&history),
            &no_catalog(),
            created_at() + Duration::hours(1),
        );

        let impact = |kind| analysis.factor(kind).map(|factor| factor.impact);
        assert_eq!(impact(WinFactorKind::MarginHealth), Some(40));
        assert_eq!(impact(WinFactorKind::CustomerRelationship), Some(-10));
        assert_eq!(impact(WinFactorKind::QuoteVelocity), Some(20));
        assert_eq!(impact(WinFactorKind::ProductFit), None);
        assert_eq!(impact(WinFactorKind::DiscountDepth), None);
        assert_eq!(analysis.score, 50);
    }

    #[test]
    fn returning_customer_is_rewarded_but_not_for_the_quote_itself() {
        let quote = quote_with(&[thirty_percent_line()], Some("acme"));
        let own_history = CustomerHistory::new(CustomerId("acme".to_owned()))
            .with_quote(quote.id.clone(), QuoteStatus::Accepted);
        let earlier_history = own_history.clone().with_quote(QuoteId("Q-1".to_owned()), QuoteStatus::Accepted);
        let scorer = WinScorer::new();

        let own = scorer.score(&quote, Some(&own_history), &no_catalog(), created_at());
        let earlier = scorer.score(&quote, Some(&earlier_history), &no_catalog(), created_at());

        assert_eq!(own.factor(WinFactorKind::CustomerRelationship).map(|f| f.impact), Some(-10));
        assert_eq!(earlier.factor(WinFactorKind::CustomerRelationship).map(|f| f.impact), Some(20));
        assert_eq!(earlier.score, 80);
    }

    #[test]
    fn quotes_without_customer_skip_relationship_factor() {
        let quote = quote_with(&[thirty_percent_line()], None);

        let analysis = WinScorer::new().score(&quote, None, &no_catalog(), created_at());

        assert!(analysis.factor(WinFactorKind::CustomerRelationship).is_none());
        assert_eq!(analysis.score, 60);
    }

    #[test]
    fn margin_factor_interpolates_between_bands() {
        let impact = |gm: i64| margin_factor(Decimal::new(gm, 4)).impact;

        assert_eq!(impact(3_500), 40);
        assert_eq!(impact(3_000), 40);
        assert_eq!(impact(2_125), 23);
        assert_eq!(impact(1_500), 10);
        assert_eq!(impact(1_000), 0);
        assert_eq!(impact(-500), 0);
    }

    #[test]
    fn velocity_boundaries() {
        let impact = |age: Duration| velocity_factor(age).impact;

        assert_eq!(impact(Duration::zero()), 20);
        assert_eq!(impact(Duration::hours(4)), 20);
        assert_eq!(impact(Duration::hours(4) + Duration::seconds(1)), 0);
        assert_eq!(impact(Duration::hours(24)), 0);
        assert_eq!(impact(Duration::hours(25)), -5);
        assert_eq!(impact(Duration::hours(48)), -5);
        assert_eq!(impact(Duration::hours(49)), -10);
        assert_eq!(impact(Duration::days(11)), -50);
    }

    #[test]
    fn product_fit_classifies_part_numbered_lines() {
        let catalog: HashMap<String, StockStatus> = [
            ("STD-1".to_owned(), StockStatus::InStock),
            ("STD-2".to_owned(), StockStatus::Standard),
            ("BO-1".to_owned(), StockStatus::Backordered),
            ("CUS-1".to_owned(), StockStatus::Custom),
            ("SPO-1".to_owned(), StockStatus::SpecialOrder),
        ]
        .into_iter()
        .collect();
        let scorer = WinScorer::new();
        let fit = |inputs: &[LineInput]| {
            scorer
                .score(&quote_with(inputs, None), None, &catalog, created_at())
                .factor(WinFactorKind::ProductFit)
                .map(|factor| factor.impact)
        };

        // four standard, one unknown part treated as standard
        assert_eq!(
            fit(&[part("STD-1"), part("STD-2"), part("STD-1"), part("STD-2"), part("NEW-9")]),
            Some(10)
        );
        assert_eq!(
            fit(&[part("STD-1"), part("STD-2"), part("STD-1"), part("BO-1"), part("BO-1")]),
            Some(0)
        );
        assert_eq!(fit(&[part("STD-1"), part("CUS-1"), part("SPO-1"), part("BO-1")]), Some(-10));
        // lines without part numbers are ignored
        assert_eq!(fit(&[thirty_percent_line(), part("STD-1")]), Some(10));
        assert_eq!(fit(&[thirty_percent_line()]), None);
    }

    #[test]
    fn discount_depth_only_penalizes_unsanctioned_low_margins() {
        let thin = LineInput::new(Decimal::new(100, 0), "USD", 1, Decimal::ONE)
            .with_override_markup(Decimal::new(10, 2));
        let mut quote = quote_with(&[thin], None);
        let scorer = WinScorer::new();

        let draft = scorer.score(&quote, None, &no_catalog(), created_at());
        assert_eq!(draft.factor(WinFactorKind::DiscountDepth).map(|f| f.impact), Some(-10));

        quote.status = QuoteStatus::Approved;
        let approved = scorer.score(&quote, None, &no_catalog(), created_at());
        assert_eq!(approved.factor(WinFactorKind::DiscountDepth).map(|f| f.impact), Some(0));

        let healthy = quote_with(&[thirty_percent_line()], None);
        let analysis = scorer.score(&healthy, None, &no_catalog(), created_at());
        assert!(analysis.factor(WinFactorKind::DiscountDepth).is_none());
    }

    #[test]
    fn score_is_clamped_and_recorded() {
        let thin = LineInput::new(Decimal::new(100, 0), "USD", 1, Decimal::ONE)
            .with_override_markup(Decimal::ZERO)
            .with_part_number("CUS-1");
        let catalog: HashMap<String, StockStatus> =
            [("CUS-1".to_owned(), StockStatus::Custom)].into_iter().collect();
        let mut quote = quote_with(&[thin], Some("acme"));

        let score = WinScorer::new().score_and_record(
            &mut quote,
            None,
            &catalog,
            created_at() + Duration::days(30),
        );

        assert_eq!(score, 0);
        assert_eq!(quote.win_probability(), Some(0));
        let analysis = quote.win_analysis().expect("analysis stored");
        assert_eq!(analysis.factors.len(), 5);
        assert!(analysis.factors.iter().map(|f| i64::from(f.impact)).sum::<i64>() < 0);
    }
}
