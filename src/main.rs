use anyhow::Context;
use clap::Parser;
use price_scout::config::Settings;
use price_scout::scrapers::{load_targets, source_label, ChromeRenderer, PriceExtractor};
use price_scout::sink::{SheetsClient, SinkWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "price-scout")]
#[command(about = "Check product prices and append them to a shared Google Sheet")]
struct Cli {
    /// Target file, e.g. configs/tgdd.json
    config: PathBuf,

    /// Source label stamped into every row (default: config file name, uppercased)
    #[arg(long)]
    label: Option<String>,

    /// Also write the batch to this JSON file
    #[arg(long)]
    save_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = Settings::load().context("Invalid configuration")?;
    let targets = load_targets(&cli.config).context("Cannot load targets")?;
    let label = cli
        .label
        .unwrap_or_else(|| source_label(&cli.config));

    info!("🏷️  Price Scout - {} ({} targets)", label, targets.len());

    let renderer = ChromeRenderer::launch(&settings.browser)?;
    let extractor = PriceExtractor::new(renderer, &settings.extractor, label);

    let sheets = SheetsClient::new(&settings.sheets).context("Failed to create Sheets client")?;
    let writer = SinkWriter::new(sheets, settings.sink.clone());

    let report = price_scout::run(&targets, &extractor, &writer, cli.save_json.as_deref()).await;

    if report.succeeded() {
        info!("✅ Done: {} rows", report.results.len());
        Ok(ExitCode::SUCCESS)
    } else {
        error!("❌ Rows were not saved to the sheet");
        Ok(ExitCode::FAILURE)
    }
}
