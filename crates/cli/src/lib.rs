pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use landquote_core::config::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "landquote",
    about = "Landquote operator CLI",
    long_about = "Price landed-cost quote lines, score win probability, inspect configuration, and run workflow smoke checks.",
    after_help = "Examples:\n  landquote config\n  landquote price --input lines.json\n  landquote score --input quote.json --now 2026-06-01T10:00:00Z\n  landquote smoke"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Explicit config file (defaults to landquote.toml or config/landquote.toml)")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Price a batch of quote lines and report line breakdowns and totals")]
    Price {
        #[arg(long, help = "JSON file with a `lines` array of line inputs")]
        input: PathBuf,
    },
    #[command(about = "Compute the explainable win-probability score for a quote")]
    Score {
        #[arg(long, help = "JSON file describing the quote, customer history and catalog")]
        input: PathBuf,
        #[arg(long, help = "Scoring instant as RFC 3339 (defaults to the current time)")]
        now: Option<String>,
    },
    #[command(about = "Run the quote workflow end to end against in-memory stores")]
    Smoke,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
        ..LoadOptions::default()
    };

    if let Ok(config) = AppConfig::load(options.clone()) {
        init_logging(&config);
    }

    let result = match cli.command {
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run(&options) }
        }
        Command::Price { input } => commands::price::run(&input, options),
        Command::Score { input, now } => commands::score::run(&input, now.as_deref(), options),
        Command::Smoke => commands::smoke::run(options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(log_level);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
