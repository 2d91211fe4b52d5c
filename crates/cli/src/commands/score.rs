use std::path::Path;

use chrono::{DateTime, Utc};
use landquote_core::config::{AppConfig, LoadOptions};
use landquote_core::cpq::calculate_lines;
use landquote_core::domain::customer::{CustomerHistory, CustomerId, HistoricalQuote};
use landquote_core::domain::product::CatalogEntry;
use landquote_core::domain::quote::{LineInput, Quote, QuoteStatus, UserId};
use landquote_core::domain::win::WinAnalysis;
use landquote_core::errors::{ApplicationError, CoreError};
use landquote_core::rates::RateResolver;
use landquote_core::scoring::WinScorer;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::commands::{read_json, CommandResult, EXIT_BAD_REQUEST};

/// Quote facts needed for scoring. Lines are priced with the configured VAT
/// rate so the margin matches what the quote would store.
#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default = "default_status")]
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<LineInput>,
    #[serde(default)]
    pub history: Vec<HistoricalQuote>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
}

fn default_status() -> QuoteStatus {
    QuoteStatus::Draft
}

#[derive(Debug, Serialize)]
pub struct ScoreReport {
    pub gm_percent: Decimal,
    pub analysis: WinAnalysis,
}

pub fn run(input: &Path, now: Option<&str>, options: LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return CommandResult::config_failure("score", &error),
    };
    let now = match parse_now(now) {
        Ok(now) => now,
        Err(message) => {
            return CommandResult::failure("score", "bad_request", message, EXIT_BAD_REQUEST)
        }
    };
    let request: ScoreRequest = match read_json(input) {
        Ok(request) => request,
        Err(error) => {
            return CommandResult::failure("score", "bad_request", format!("{error:#}"), EXIT_BAD_REQUEST)
        }
    };

    match score(request, &config.pricing, now) {
        Ok(report) => {
            let message = format!(
                "win probability {} from {} factor(s)",
                report.analysis.score,
                report.analysis.factors.len()
            );
            CommandResult::success_with_report("score", message, &report)
        }
        Err(error) => CommandResult::from_application_error("score", ApplicationError::from(error)),
    }
}

pub fn score(
    request: ScoreRequest,
    rates: &impl RateResolver,
    now: DateTime<Utc>,
) -> Result<ScoreReport, CoreError> {
    let snapshot = rates.resolve();
    let lines = calculate_lines(&request.lines, snapshot.vat_rate)?;
    let customer_id = request.customer_id.map(CustomerId);
    let history = customer_id
        .clone()
        .map(|customer_id| CustomerHistory { customer_id, quotes: request.history });

    let mut quote = Quote::new_draft(
        UserId("cli".to_owned()),
        customer_id,
        lines,
        snapshot.quote_validity_days,
        request.created_at,
    )?;
    quote.status = request.status;

    let analysis = WinScorer::new().score(&quote, history.as_ref(), &request.catalog, now);
    Ok(ScoreReport { gm_percent: quote.overall_gm_percent(), analysis })
}

fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>, String> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|error| format!("`--now` must be an RFC 3339 timestamp: {error}")),
    }
}
