use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use landquote_cli::commands::{config, price, score, smoke};
use landquote_core::config::LoadOptions;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn price_returns_breakdown_and_totals() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_file(
            &dir,
            "lines.json",
            r#"{"lines":[{"buy_price":"263.58","currency":"EUR","quantity":1,
                "freight_rate":"0.05","exchange_rate":"0.72","override_markup_percent":"0"}]}"#,
        );

        let result = price::run(&input, LoadOptions::default());
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "price");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["vat_rate"], "0.15");
        assert_eq!(payload["data"]["lines"][0]["breakdown"]["landed_cost"], "199.2665");
        assert_eq!(payload["data"]["totals"]["total_selling_ex_vat"], "199.27");
        assert_eq!(payload["data"]["totals"]["total_selling_inc_vat"], "229.16");
        assert_eq!(payload["data"]["margin_health"], "critical");
        assert_eq!(payload["data"]["requires_approval"], true);
    });
}

#[test]
fn price_uses_vat_rate_from_environment() {
    with_env(&[("LANDQUOTE_VAT_RATE", "0.20")], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_file(
            &dir,
            "lines.json",
            r#"{"lines":[{"buy_price":"100","currency":"USD","quantity":2,"exchange_rate":"1"}]}"#,
        );

        let result = price::run(&input, LoadOptions::default());
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["totals"]["total_selling_ex_vat"], "250.00");
        assert_eq!(payload["data"]["totals"]["total_vat"], "50.00");
    });
}

#[test]
fn price_reports_the_offending_line() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_file(
            &dir,
            "lines.json",
            r#"{"lines":[
                {"buy_price":"10","currency":"USD","quantity":1,"exchange_rate":"1"},
                {"buy_price":"10","currency":"USD","quantity":0,"exchange_rate":"1"}]}"#,
        );

        let result = price::run(&input, LoadOptions::default());
        assert_eq!(result.exit_code, 3, "expected bad request exit code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "bad_request");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("on line 2"), "message was {message}");
        assert!(payload["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
    });
}

#[test]
fn price_rejects_amounts_beyond_decimal_range() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_file(
            &dir,
            "lines.json",
            r#"{"lines":[{"buy_price":"100000000000000000000","currency":"USD",
                "quantity":4294967295,"exchange_rate":"1"}]}"#,
        );

        let result = price::run(&input, LoadOptions::default());
        assert_eq!(result.exit_code, 3, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "bad_request");
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("amount exceeds supported range"), "message was {message}");
        assert!(message.contains("on line 1"), "message was {message}");
    });
}

#[test]
fn price_rejects_unreadable_input() {
    with_env(&[], || {
        let result = price::run(Path::new("does-not-exist.json"), LoadOptions::default());
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "bad_request");
    });
}

#[test]
fn price_fails_with_config_error_class() {
    with_env(&[("LANDQUOTE_VAT_RATE", "fifteen")], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_file(&dir, "lines.json", r#"{"lines":[]}"#);

        let result = price::run(&input, LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "price");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn score_explains_factors_at_a_fixed_instant() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_file(
            &dir,
            "quote.json",
            r#"{"customer_id":"acme","created_at":"2026-06-01T09:00:00Z",
                "lines":[{"buy_price":"100","currency":"USD","quantity":1,
                          "exchange_rate":"1","override_markup_percent":"0.4286"}],
                "history":[{"quote_id":"Q-old","status":"rejected"}]}"#,
        );

        let result = score::run(&input, Some("2026-06-01T10:00:00Z"), LoadOptions::default());
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["data"]["gm_percent"], "0.3000");
        assert_eq!(payload["data"]["analysis"]["score"], 50);
        let factors = payload["data"]["analysis"]["factors"].as_array().cloned().unwrap_or_default();
        let impact = |name: &str| {
            factors
                .iter()
                .find(|factor| factor["factor"] == name)
                .and_then(|factor| factor["impact"].as_i64())
        };
        assert_eq!(impact("margin_health"), Some(40));
        assert_eq!(impact("customer_relationship"), Some(-10));
        assert_eq!(impact("quote_velocity"), Some(20));
        assert_eq!(impact("product_fit"), None);
    });
}

#[test]
fn score_rejects_malformed_instant() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_file(&dir, "quote.json", r#"{"created_at":"2026-06-01T09:00:00Z","lines":[]}"#);

        let result = score::run(&input, Some("yesterday"), LoadOptions::default());
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "bad_request");
    });
}

#[test]
fn config_reports_value_sources() {
    with_env(&[("LANDQUOTE_VAT_RATE", "0.2")], || {
        let dir = TempDir::new().expect("temp dir");
        let path = write_file(
            &dir,
            "landquote.toml",
            "[pricing]\nsmart_approval_floor = 0.18\n\n[logging]\nformat = \"json\"\n",
        );
        let options = LoadOptions { config_path: Some(path.clone()), require_file: true, ..LoadOptions::default() };

        let output = config::run(&options);

        assert!(output.contains("- pricing.vat_rate = 0.2 (source: env (LANDQUOTE_VAT_RATE))"), "{output}");
        assert!(
            output.contains(&format!(
                "- pricing.smart_approval_floor = 0.18 (source: file ({}))",
                path.display()
            )),
            "{output}"
        );
        assert!(output.contains("- logging.format = json (source: file"), "{output}");
        assert!(output.contains("- pricing.quote_validity_days = 30 (source: default)"), "{output}");
    });
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("LANDQUOTE_SMART_APPROVAL_FLOOR", "1.5")], || {
        let output = config::run(&LoadOptions::default());

        assert!(output.starts_with("config validation failed:"), "{output}");
    });
}

#[test]
fn smoke_returns_success_report_with_default_config() {
    with_env(&[], || {
        let result = smoke::run(LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful smoke report: {}", result.output);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
        assert_eq!(payload["checks"].as_array().map(Vec::len), Some(5));
    });
}

#[test]
fn smoke_returns_failure_when_config_invalid() {
    with_env(&[("LANDQUOTE_QUOTE_VALIDITY_DAYS", "0")], || {
        let result = smoke::run(LoadOptions::default());
        assert_eq!(result.exit_code, 6, "expected smoke failure code");

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][4]["status"], "skipped");
    });
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "LANDQUOTE_VAT_RATE",
        "LANDQUOTE_QUOTE_VALIDITY_DAYS",
        "LANDQUOTE_LOW_MARGIN_THRESHOLD",
        "LANDQUOTE_CRITICAL_MARGIN_THRESHOLD",
        "LANDQUOTE_SMART_APPROVAL_FLOOR",
        "LANDQUOTE_LOGGING_LEVEL",
        "LANDQUOTE_LOGGING_FORMAT",
        "LANDQUOTE_LOG_LEVEL",
        "LANDQUOTE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
