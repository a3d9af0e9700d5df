mod logging;
mod signal;

use clap::Parser;
use labwatch_config::{render, ConfigLoader};
use labwatch_scheduler::{CycleOutcome, HttpClientProvider, MonitoringScheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Clinical lab alert monitor")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "labwatch.toml")]
    config: PathBuf,

    /// Run a single monitoring cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ConfigLoader::new(&args.config).load()?;
    if args.print_config {
        print!("{}", render(&config)?);
        return Ok(());
    }

    logging::init(&config.logging)?;
    info!(config = %args.config.display(), sources = config.sources.len(), "Starting labwatch");

    let provider = Arc::new(HttpClientProvider::new(config.clone()));
    let mut scheduler = MonitoringScheduler::new(&config, provider).await?;

    if args.once {
        return match scheduler.run_once().await? {
            CycleOutcome::Completed(report) => {
                info!(
                    alerts = report.alerts.len(),
                    failed_sources = ?report.failed_sources,
                    "Single cycle completed"
                );
                Ok(())
            }
            CycleOutcome::Failed(e) => Err(e.into()),
        };
    }

    tokio::spawn(signal::stop_on_signal(scheduler.handle()));
    scheduler.start().await?;

    if let Ok(metrics) = scheduler.metrics().export() {
        debug!(metrics = %metrics, "Final runtime metrics");
    }
    Ok(())
}
