use std::time::Instant;

use chrono::Utc;
use landquote_core::approvals::{ApprovalEngine, InMemoryNotifier};
use landquote_core::audit::InMemoryAuditSink;
use landquote_core::config::{AppConfig, LoadOptions, PricingConfig};
use landquote_core::domain::customer::CustomerId;
use landquote_core::domain::product::{CatalogEntry, StockStatus};
use landquote_core::domain::quote::{LineInput, Quote, QuoteStatus, UserId};
use landquote_core::errors::ApplicationError;
use landquote_core::scoring::WinScorer;
use landquote_db::{
    CustomerHistoryRepository, InMemoryProductRepository, InMemoryQuoteStore, ProductRepository,
    QuoteRepository,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_SMOKE_FAILED};

type SmokeEngine = ApprovalEngine<PricingConfig, InMemoryNotifier, InMemoryAuditSink>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

const CHECKS: [&str; 5] =
    ["config_validation", "pricing", "approval_workflow", "persistence", "win_scoring"];

pub fn run(options: LoadOptions) -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(options)) {
        Ok((elapsed_ms, config)) => {
            checks.push(pass(CHECKS[0], elapsed_ms, "configuration loaded and validated"));
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(fail(CHECKS[0], elapsed_ms, error.to_string()));
            return finalize_report(checks, started);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(fail(CHECKS[1], 0, format!("failed to initialize async runtime: {error}")));
            return finalize_report(checks, started);
        }
    };

    let engine = ApprovalEngine::new(
        config.pricing.clone(),
        InMemoryNotifier::default(),
        InMemoryAuditSink::default(),
    );
    let store = InMemoryQuoteStore::default();
    let products = InMemoryProductRepository::default();

    let steps: [(&'static str, &dyn Fn() -> Result<String, String>); 4] = [
        (CHECKS[1], &|| check_pricing(&engine)),
        (CHECKS[2], &|| check_workflow(&engine)),
        (CHECKS[3], &|| runtime.block_on(check_persistence(&engine, &store))),
        (CHECKS[4], &|| runtime.block_on(check_scoring(&engine, &store, &products))),
    ];

    for (name, step) in steps {
        if checks.iter().any(|check| check.status == SmokeStatus::Fail) {
            checks.push(skipped(name));
            continue;
        }
        match timed_check(step) {
            Ok((elapsed_ms, message)) => checks.push(pass(name, elapsed_ms, message)),
            Err((elapsed_ms, message)) => checks.push(fail(name, elapsed_ms, message)),
        }
    }

    finalize_report(checks, started)
}

fn sample_lines() -> Vec<LineInput> {
    vec![
        LineInput::new(Decimal::new(26_358, 2), "EUR", 1, Decimal::new(72, 2))
            .with_part_number("GBX-220")
            .with_rates(Decimal::new(5, 2), Decimal::ZERO, Decimal::ZERO)
            .with_target_markup(Decimal::new(35, 2)),
        LineInput::new(Decimal::new(100, 0), "USD", 3, Decimal::new(185, 1))
            .with_part_number("MTR-7")
            .with_rates(Decimal::new(10, 2), Decimal::new(20, 2), Decimal::new(5, 2)),
    ]
}

fn sales_rep() -> UserId {
    UserId("smoke-rep".to_owned())
}

fn draft(engine: &SmokeEngine) -> Result<Quote, String> {
    engine
        .create_draft(sales_rep(), Some(CustomerId("smoke-customer".to_owned())), &sample_lines(), Utc::now())
        .map_err(|error| error.to_string())
}

fn check_pricing(engine: &SmokeEngine) -> Result<String, String> {
    let quote = draft(engine)?;
    let totals = quote.totals();
    if totals.total_selling_inc_vat != totals.total_selling_ex_vat + totals.total_vat {
        return Err(format!(
            "inc-VAT total {} does not equal ex-VAT {} plus VAT {}",
            totals.total_selling_inc_vat, totals.total_selling_ex_vat, totals.total_vat
        ));
    }
    Ok(format!(
        "{} lines priced at {} inc VAT",
        totals.line_count, totals.total_selling_inc_vat
    ))
}

fn check_workflow(engine: &SmokeEngine) -> Result<String, String> {
    let mut quote = draft(engine)?;
    let now = Utc::now();
    let outcome = engine.submit(&mut quote, &sales_rep(), now).map_err(|error| error.to_string())?;
    if outcome.requires_approval {
        engine
            .approve(&mut quote, &UserId("smoke-manager".to_owned()), "smoke approval", now)
            .map_err(|error| error.to_string())?;
    }
    engine.accept(&mut quote, "Smoke Signer", now).map_err(|error| error.to_string())?;

    if quote.status != QuoteStatus::Accepted {
        return Err(format!("expected accepted quote, found `{}`", quote.status));
    }
    let path = if outcome.requires_approval { "manual approval" } else { "auto-approval" };
    Ok(format!("draft -> accepted via {path}"))
}

async fn check_persistence(engine: &SmokeEngine, store: &InMemoryQuoteStore) -> Result<String, String> {
    let mut quote = draft(engine)?;
    engine.submit(&mut quote, &sales_rep(), Utc::now()).map_err(|error| error.to_string())?;
    if quote.status == QuoteStatus::Pending {
        engine
            .approve(&mut quote, &UserId("smoke-manager".to_owned()), "", Utc::now())
            .map_err(|error| error.to_string())?;
    }
    let amendment = engine.amend(&quote, Utc::now()).map_err(|error| error.to_string())?;

    store.save(quote.clone()).await.map_err(persistence_error)?;
    store.save(amendment.clone()).await.map_err(persistence_error)?;

    let lineage = store.lineage(&amendment.id).await.map_err(persistence_error)?;
    if lineage != vec![quote.id.clone(), amendment.id.clone()] {
        return Err(format!("unexpected lineage {lineage:?}"));
    }
    let stored = store.find_by_id(&quote.id).await.map_err(persistence_error)?;
    if stored.as_ref().map(|stored| stored.lines()) != Some(quote.lines()) {
        return Err("stored lines differ from saved quote".to_string());
    }

    let plan = store.delete(&amendment.id).await.map_err(persistence_error)?;
    Ok(format!("saved, amended and deleted in {} steps", plan.steps.len()))
}

async fn check_scoring(
    engine: &SmokeEngine,
    store: &InMemoryQuoteStore,
    products: &InMemoryProductRepository,
) -> Result<String, String> {
    for (part_number, stock_status) in [("GBX-220", StockStatus::InStock), ("MTR-7", StockStatus::Standard)] {
        products
            .save(CatalogEntry {
                part_number: part_number.to_owned(),
                name: format!("Smoke part {part_number}"),
                stock_status,
            })
            .await
            .map_err(persistence_error)?;
    }

    let mut quote = draft(engine)?;
    let customer_id = CustomerId("smoke-customer".to_owned());
    let history = store.history_for(&customer_id).await.map_err(persistence_error)?;
    let catalog = products.snapshot().await.map_err(persistence_error)?;

    let score =
        WinScorer::new().score_and_record(&mut quote, Some(&history), &catalog, Utc::now());
    if score > 100 || quote.win_probability() != Some(score) {
        return Err(format!("win probability {score} was not recorded"));
    }
    Ok(format!("win probability {score} across {} factors", quote.win_analysis().map_or(0, |a| a.factors.len())))
}

fn persistence_error(error: landquote_db::RepositoryError) -> String {
    ApplicationError::from(error).to_string()
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((elapsed_ms(started), value)),
        Err(error) => Err((elapsed_ms(started), error)),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn pass(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Pass, elapsed_ms, message: message.into() }
}

fn fail(name: &'static str, elapsed_ms: u64, message: impl Into<String>) -> SmokeCheck {
    SmokeCheck { name, status: SmokeStatus::Fail, elapsed_ms, message: message.into() }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due to previous failure".to_string(),
    }
}

fn finalize_report(mut checks: Vec<SmokeCheck>, started: Instant) -> CommandResult {
    for name in CHECKS.iter().skip(checks.len()) {
        checks.push(skipped(name));
    }

    let total_elapsed_ms = elapsed_ms(started);
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult {
        exit_code: if failed { EXIT_SMOKE_FAILED } else { 0 },
        output: format!("{human}\n{machine}"),
    }
}
