mod config;
mod error;
mod gateway;
mod history;
mod holdings;
mod market;
mod model;
mod monitor;
mod notifier;
mod scheduler;
#[cfg(test)]
mod testutil;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use gateway::MessagingGateway;
use gateway::telegram::TelegramGateway;
use holdings::HoldingsStore;
use holdings::sqlite::SqliteHoldings;
use market::MarketDataAggregator;
use market::moex::MoexAggregator;
use monitor::PriceMonitor;
use notifier::ChangeNotifier;
use scheduler::Scheduler;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("holdings store error")]
    Holdings,
    #[display("runtime error")]
    Runtime,
}

#[derive(Parser)]
#[command(name = "portfolio-notifier", about = "Portfolio price change notifier")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Run a single monitoring cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config);

    // ── Collaborators ─────────────────────────────────────────────────────────
    let db_path = format!("{}/portfolio-notifier.db", config.general.data_dir);
    let holdings: Arc<dyn HoldingsStore> = Arc::new(
        SqliteHoldings::open(Path::new(&db_path))
            .await
            .change_context(AppError::Holdings)?,
    );

    let market: Arc<dyn MarketDataAggregator> =
        Arc::new(MoexAggregator::new(&config.market.base_url));

    let gateway: Arc<dyn MessagingGateway> = Arc::new(TelegramGateway::new(
        &config.telegram.api_base,
        &config.telegram.bot_token,
    ));

    // ── Pipeline ──────────────────────────────────────────────────────────────
    let monitor = PriceMonitor::new(
        Arc::clone(&holdings),
        market,
        config.monitor.threshold_pct,
    );
    let notifier = ChangeNotifier::new(
        holdings,
        gateway,
        Duration::from_millis(config.monitor.send_delay_ms),
    );
    let mut scheduler = Scheduler::new(
        monitor,
        notifier,
        Duration::from_secs(config.monitor.cycle_backoff_secs),
    );

    if cli.once {
        let sent = scheduler.run_once().await;
        info!(sent, "single monitoring cycle complete");
        return Ok(());
    }

    scheduler.start(Duration::from_secs(config.monitor.interval_minutes * 60));

    // ── Shutdown ──────────────────────────────────────────────────────────────
    tokio::signal::ctrl_c()
        .await
        .change_context(AppError::Runtime)?;

    info!("ctrl+c received, shutting down");
    scheduler.stop().await;

    info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
