use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quarry::label::TextGenerator;
use quarry::store::{JsonDirReportStore, JsonFileEventStore, ReportStore};
use quarry::{AnalyticsConfig, AnalyticsEngine, UnavailableGenerator};

/// Quarry - topic clusters from a query log
#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Cluster logged user questions into labeled topics")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run analytics for a tenant and print the report
    Run {
        /// JSON-lines file of query events
        #[arg(long, value_name = "FILE")]
        events: PathBuf,

        /// Directory holding one report per tenant
        #[arg(long, value_name = "DIR")]
        reports: PathBuf,

        /// Tenant to analyze
        #[arg(long)]
        tenant: String,

        /// Use this many clusters instead of the elbow search
        #[arg(long)]
        clusters: Option<usize>,

        /// JSON config file (defaults and QUARRY_* variables otherwise)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print a tenant's saved report
    Show {
        /// Directory holding one report per tenant
        #[arg(long, value_name = "DIR")]
        reports: PathBuf,

        /// Tenant whose report to print
        #[arg(long)]
        tenant: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("QUARRY_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn generator() -> Arc<dyn TextGenerator> {
    #[cfg(feature = "http")]
    match quarry::HttpTextGenerator::from_env() {
        Ok(generator) => return Arc::new(generator),
        Err(e) => warn!(error = %e, "no text generator configured, labels will fall back"),
    }
    #[cfg(not(feature = "http"))]
    warn!("built without http support, labels will fall back");

    Arc::new(UnavailableGenerator)
}

async fn run(cli: Cli) -> quarry::Result<String> {
    match cli.command {
        Command::Run {
            events,
            reports,
            tenant,
            clusters,
            config,
        } => {
            let config = match config {
                Some(path) => AnalyticsConfig::from_json_file(path)?,
                None => AnalyticsConfig::from_env()?,
            };
            info!(events = %events.display(), reports = %reports.display(), "loading stores");

            let engine = AnalyticsEngine::new(
                Arc::new(JsonFileEventStore::new(events)),
                Arc::new(JsonDirReportStore::new(reports)),
                generator(),
                config,
            );
            let report = engine.run_analytics(&tenant, clusters).await?;
            Ok(serde_json::to_string_pretty(&report.to_report())?)
        }
        Command::Show { reports, tenant } => {
            let report = JsonDirReportStore::new(reports)
                .get_report(&tenant)
                .await?
                .ok_or_else(|| quarry::Error::NotFound(format!("no report for tenant {tenant}")))?;
            Ok(serde_json::to_string_pretty(&report)?)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
