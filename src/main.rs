//! pricelens CLI
//!
//! Detect prices in text files and convert them from the command line.
//!
//! # Usage
//!
//! ```bash
//! # List the prices found in a file
//! pricelens scan --input page.txt
//!
//! # Show the tagged markup instead
//! pricelens scan --input page.txt --format html
//!
//! # Convert one amount using live rates
//! pricelens convert --amount 1234.56 --from USD --to EUR
//!
//! # Convert every price in a file, offline, from a saved rate payload
//! pricelens annotate --input page.txt --to EUR --rates usd.json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use pricelens::config::{AppConfig, JsonSettingsStore};
use pricelens::core::currency::{format_money, CurrencyCode};
use pricelens::rates::cache::RateCache;
use pricelens::rates::message::Notification;
use pricelens::rates::provider::{
    parse_rate_payload, HttpRateProvider, RateProvider, StaticRateProvider,
};
use pricelens::rates::service::{RateService, RateServiceHandle};
use pricelens::scan::document::Document;
use pricelens::scan::interaction::DisplayInstruction;
use pricelens::scan::page::Page;
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "pricelens", version, about = "Detect and convert prices in text")]
struct Cli {
    /// JSON config file (missing file means defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List prices detected in a text file
    Scan(ScanArgs),
    /// Convert a single amount
    Convert(ConvertArgs),
    /// Convert every price detected in a text file
    Annotate(AnnotateArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Html,
}

#[derive(Args)]
struct ScanArgs {
    /// Text file, one paragraph per line
    #[arg(long)]
    input: PathBuf,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Args)]
struct RateSource {
    /// Saved provider payload (`{"base": ..., "rates": {...}}`) to use instead of the network
    #[arg(long)]
    rates: Option<PathBuf>,
}

#[derive(Args)]
struct ConvertArgs {
    #[arg(long)]
    amount: Decimal,

    #[arg(long)]
    from: String,

    /// Target currency (default: configured target)
    #[arg(long)]
    to: Option<String>,

    #[command(flatten)]
    source: RateSource,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Args)]
struct AnnotateArgs {
    #[arg(long)]
    input: PathBuf,

    /// Target currency (default: configured target)
    #[arg(long)]
    to: Option<String>,

    #[command(flatten)]
    source: RateSource,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

/// JSON output schema for a detected price.
#[derive(serde::Serialize)]
struct DetectedOutput {
    original: String,
    amount: String,
    currency: String,
}

/// JSON output schema for an annotated price.
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotationOutput {
    original: String,
    amount: String,
    currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    converted_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn load_config(path: Option<&Path>) -> AppConfig {
    match path {
        Some(path) => JsonSettingsStore::new(path)
            .load()
            .unwrap_or_else(|e| fail(e)),
        None => AppConfig::default(),
    }
}

fn parse_currency(code: &str) -> CurrencyCode {
    CurrencyCode::parse(code).unwrap_or_else(|e| fail(e))
}

fn load_document(path: &Path) -> Document {
    let text = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("reading '{}': {}", path.display(), e)));
    Document::from_text(&text)
}

fn build_provider(config: &AppConfig, source: &RateSource) -> Arc<dyn RateProvider> {
    let Some(path) = &source.rates else {
        return Arc::new(HttpRateProvider::new(config.rates.provider_url.clone()));
    };
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("reading '{}': {}", path.display(), e)));
    let payload: serde_json::Value =
        serde_json::from_str(&content).unwrap_or_else(|e| fail(format!("parsing rates: {}", e)));
    let base = payload
        .get("base")
        .and_then(|b| b.as_str())
        .map(CurrencyCode::new)
        .unwrap_or_else(|| CurrencyCode::new("USD"));
    let table = parse_rate_payload(&base, &payload).unwrap_or_else(|e| fail(e));
    Arc::new(StaticRateProvider::from_table(table))
}

fn start_service(
    config: &AppConfig,
    source: &RateSource,
    target: &CurrencyCode,
) -> RateServiceHandle {
    let cache = Arc::new(RateCache::new(
        build_provider(config, source),
        config.rates.policy(),
    ));
    let (_preferred_tx, preferred) = watch::channel(target.clone());
    RateService::new(cache, preferred).spawn(32)
}

fn cmd_scan(args: ScanArgs) {
    let mut page = Page::new(load_document(&args.input), CurrencyCode::new("USD"));
    let report = page.scan();

    match args.format {
        Format::Html => println!("{}", page.document().to_markup(page.document().root())),
        Format::Json => {
            let output: Vec<DetectedOutput> = page
                .tagged_amounts()
                .into_iter()
                .map(|t| DetectedOutput {
                    original: t.original,
                    amount: t.amount.to_string(),
                    currency: t.currency.to_string(),
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail(e))
            );
        }
        Format::Text => {
            for tagged in page.tagged_amounts() {
                println!(
                    "{:<20} {:>16} {}",
                    tagged.original,
                    tagged.amount.to_string(),
                    tagged.currency
                );
            }
            println!("\nPrices found: {}", report.amounts_tagged());
        }
    }
}

async fn cmd_convert(config: AppConfig, args: ConvertArgs) {
    let from = parse_currency(&args.from);
    let to = args
        .to
        .as_deref()
        .map(parse_currency)
        .unwrap_or_else(|| config.settings.target_currency.clone());

    let service = start_service(&config, &args.source, &to);
    let response = service
        .convert(args.amount, from, to)
        .await
        .unwrap_or_else(|e| fail(e));

    if args.format == Format::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).unwrap_or_else(|e| fail(e))
        );
        return;
    }
    let stale = response.stale;
    match response.into_result() {
        Ok(result) => println!(
            "{} = {} (rate: {}){}",
            format_money(args.amount, &result.from_currency, config.settings.precision),
            result.display_amount(config.settings.precision),
            result.rate,
            if stale { " [stale rates]" } else { "" }
        ),
        Err(error) => fail(error),
    }
}

async fn cmd_annotate(config: AppConfig, args: AnnotateArgs) {
    let target = args
        .to
        .as_deref()
        .map(parse_currency)
        .unwrap_or_else(|| config.settings.target_currency.clone());

    let mut page = Page::new(load_document(&args.input), target.clone());
    page.notify(Notification::ToggleExtension {
        enabled: config.settings.enable_extension,
    });
    page.scan();

    let service = start_service(&config, &args.source, &target);
    let precision = config.settings.precision;
    let mut rows = Vec::new();
    for tagged in page.tagged_amounts() {
        let instruction = page.hover_and_resolve(tagged.node, &service).await;
        page.leave(tagged.node);

        let mut row = AnnotationOutput {
            original: tagged.original,
            amount: tagged.amount.to_string(),
            currency: tagged.currency.to_string(),
            converted_amount: None,
            rate: None,
            error: None,
        };
        match instruction {
            Some(DisplayInstruction::Converted { result, .. }) => {
                row.converted_amount = Some(result.display_amount(precision));
                row.rate = Some(result.rate.to_string());
            }
            Some(DisplayInstruction::Failed { error, .. }) => row.error = Some(error),
            Some(DisplayInstruction::Loading { .. }) | None => {}
        }
        rows.push(row);
    }

    if args.format == Format::Json {
        println!(
            "{}",
            serde_json::to_string_pretty(&rows).unwrap_or_else(|e| fail(e))
        );
        return;
    }
    for row in &rows {
        match (&row.converted_amount, &row.error) {
            (Some(converted), _) => println!("{:<20} → {}", row.original, converted),
            (None, Some(error)) => println!("{:<20} ✗ {}", row.original, error),
            (None, None) => println!("{:<20}   (already {})", row.original, target),
        }
    }
    println!("\nPrices annotated: {}", rows.len());
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.cmd {
        Command::Scan(args) => cmd_scan(args),
        Command::Convert(args) => cmd_convert(load_config(cli.config.as_deref()), args).await,
        Command::Annotate(args) => cmd_annotate(load_config(cli.config.as_deref()), args).await,
    }
}
