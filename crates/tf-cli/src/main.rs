//! `tf-engine` binary entrypoint.

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use tf_core::{AppConfig, TradeStatus};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

const DEFAULT_LOG_FILTER: &str = "tf_engine=info,workflow=info,trade_store=info";

#[derive(Debug, Parser)]
#[command(name = "tf-engine", version, about = "Guardrailed options trade entry workflow")]
struct Cli {
    /// Data directory (overrides TF_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Policy source, settings, in-progress trade and portfolio heat
    Status,
    /// List recorded trades
    Trades {
        #[arg(long, value_enum, default_value_t = StatusFilter::All)]
        status: StatusFilter,
    },
    /// Overall, per-sector and per-strategy performance
    Stats,
    /// Strategies offered for a sector, best fit first
    Strategies {
        sector: String,
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// Record the outcome of a trade
    Close {
        id: Uuid,
        #[arg(long)]
        exit_price: Decimal,
        #[arg(long)]
        pnl: Decimal,
    },
    /// Remove a trade from history
    Delete { id: Uuid },
    /// Throw away the in-progress trade
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StatusFilter {
    All,
    Active,
    Closed,
    Expired,
}

impl StatusFilter {
    fn status(self) -> Option<TradeStatus> {
        match self {
            Self::All => None,
            Self::Active => Some(TradeStatus::Active),
            Self::Closed => Some(TradeStatus::Closed),
            Self::Expired => Some(TradeStatus::Expired),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = AppConfig::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    // Initialize tracing; RUST_LOG wins over the configured filter
    let fallback = config
        .log_filter
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut app = commands::App::boot(config)?;
    match cli.command {
        Command::Status => app.status(),
        Command::Trades { status } => app.trades(status.status()),
        Command::Stats => app.stats(),
        Command::Strategies { sector, count } => app.strategies(&sector, count),
        Command::Close {
            id,
            exit_price,
            pnl,
        } => app.close(id, exit_price, pnl),
        Command::Delete { id } => app.delete(id),
        Command::Discard => app.discard(),
    }
}
