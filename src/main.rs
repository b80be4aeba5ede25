use anyhow::Context;
use clap::{Parser, Subcommand};
use pipbot::execution::OrderSubmitter;
use pipbot::gateway::{Gateway, HttpGateway};
use pipbot::scheduler::ExitReason;
use pipbot::{BotConfig, Scheduler};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pipbot", version, about = "Polls a trading terminal and trades a two-bar signal")]
struct Cli {
    /// Configuration file (defaults to ./pipbot.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the trading loop until a profit/loss target is hit (default)
    Run,
    /// Send a single market order with the configured SL/TP and exit
    Trade {
        /// BUY or SELL
        #[arg(long)]
        side: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();
    let config = BotConfig::load(cli.config.as_deref())?;

    let gateway = HttpGateway::new(
        &config.gateway_url,
        config.gateway_token.clone(),
        config.request_timeout(),
    )
    .context("Failed to build terminal client")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, gateway).await,
        Command::Trade { side } => trade(&config, gateway, &side).await,
    }
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pipbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: BotConfig, gateway: HttpGateway) -> anyhow::Result<()> {
    tracing::info!("🚀 pipbot starting");
    tracing::info!("📊 Configuration:");
    tracing::info!("  Symbol: {} ({})", config.symbol, config.timeframe);
    tracing::info!("  Lot size: {}", config.lot_size);
    tracing::info!("  SL/TP: {:?} / {:?} points", config.sl_pips, config.tp_pips);
    tracing::info!(
        "  Profit target: {:.2}, loss target: {:.2}",
        config.profit_target,
        config.loss_target
    );
    tracing::info!("  Poll interval: {}s", config.poll_interval_secs);
    tracing::info!("Press Ctrl+C to stop...");

    let mut scheduler = Scheduler::new(
        gateway,
        config.risk_monitor(),
        config.bar_feed(),
        OrderSubmitter::new(config.order_settings()),
        config.poll_interval(),
    );

    let summary = scheduler
        .run(shutdown_signal())
        .await
        .context("Failed to initialize terminal connection")?;

    match summary.exit {
        ExitReason::RiskLimit(reason) => tracing::info!(
            "Session ended after {} cycles: {:?} (last P/L {:?})",
            summary.cycles,
            reason,
            summary.last_profit
        ),
        ExitReason::Shutdown => tracing::info!(
            "Session interrupted after {} cycles (last P/L {:?})",
            summary.cycles,
            summary.last_profit
        ),
    }

    Ok(())
}

async fn trade(config: &BotConfig, gateway: HttpGateway, side: &str) -> anyhow::Result<()> {
    gateway
        .connect()
        .await
        .context("Failed to initialize terminal connection")?;

    let submitter = OrderSubmitter::new(config.order_settings());
    let result = submitter.place_trade(&gateway, side).await;

    if let Err(e) = gateway.disconnect().await {
        tracing::warn!("Failed to release terminal connection: {}", e);
    }

    let result = result.with_context(|| {
        format!(
            "Order for {} {} not placed",
            side,
            submitter.settings().symbol
        )
    })?;
    println!("{:?}", result);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("⚠️  Received Ctrl+C, shutting down...");
}
