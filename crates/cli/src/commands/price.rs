use std::path::Path;

use landquote_core::config::{AppConfig, LoadOptions};
use landquote_core::cpq::{aggregate, calculate_lines, format_percent, MarginHealth, QuoteTotals};
use landquote_core::domain::quote::{LineBreakdown, LineInput};
use landquote_core::errors::{ApplicationError, CoreError};
use landquote_core::rates::RateResolver;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::commands::{read_json, CommandResult, EXIT_BAD_REQUEST};

#[derive(Debug, Deserialize)]
pub struct PriceRequest {
    pub lines: Vec<LineInput>,
}

#[derive(Debug, Serialize)]
pub struct PricedLine {
    pub line_index: usize,
    pub input: LineInput,
    pub breakdown: LineBreakdown,
}

#[derive(Debug, Serialize)]
pub struct PriceReport {
    pub vat_rate: Decimal,
    pub lines: Vec<PricedLine>,
    pub totals: QuoteTotals,
    pub margin_health: MarginHealth,
    pub requires_approval: bool,
}

pub fn run(input: &Path, options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("price", &error),
    };
    let request: PriceRequest = match read_json(input) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure("price", "bad_request", format!("{error:#}"), EXIT_BAD_REQUEST)
        }
    };

    match price(&request, &config.pricing) {
        Ok(report) => {
            let message = format!(
                "priced {} line(s): {} ex VAT, gross margin {}",
                report.totals.line_count,
                report.totals.total_selling_ex_vat,
                format_percent(report.totals.overall_gm_percent)
            );
            CommandResult::success_with_report("price", message, &report)
        }
        Err(error) => CommandResult::from_application_error("price", ApplicationError::from(error)),
    }
}

pub fn price(request: &PriceRequest, rates: &impl RateResolver) -> Result<PriceReport, CoreError> {
    let snapshot = rates.resolve();
    let lines = calculate_lines(&request.lines, snapshot.vat_rate)?;
    let totals = aggregate(&lines)?;
    let thresholds = snapshot.margin_thresholds;

    info!(
        event_name = "cli.price.completed",
        line_count = totals.line_count,
        total_selling_ex_vat = %totals.total_selling_ex_vat,
        "lines priced"
    );

    Ok(PriceReport {
        vat_rate: snapshot.vat_rate,
        margin_health: totals.margin_health(&thresholds),
        requires_approval: totals.overall_gm_percent < thresholds.smart_approval_floor,
        lines: lines
            .into_iter()
            .enumerate()
            .map(|(line_index, line)| PricedLine {
                line_index,
                input: line.input().clone(),
                breakdown: line.breakdown().clone(),
            })
            .collect(),
        totals,
    })
}
