use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use engine::Engine;
use events::InProcessBus;
use exchange::{Exchange, PaperExchange, PaperExchangeConfig};

/// Runs the mean-reversion trading engine against the configured exchange.
/// All trading parameters come from the environment (see `configuration::Settings`);
/// this CLI only controls what the process does on startup.
#[derive(Parser, Debug)]
#[command(name = "zenith", about = "Automated mean-reversion trading engine")]
struct Cli {
    /// Run pending database migrations and exit without starting the engine.
    #[arg(long)]
    migrate_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = configuration::load_settings().context("failed to load configuration")?;
    configuration::init_tracing(&settings);

    tracing::info!(exchange = %settings.exchange_name, symbols = %settings.symbols, "starting zenith");

    let pool = database::connect().await.context("failed to connect to database")?;
    database::run_migrations(&pool).await.context("failed to run database migrations")?;

    if cli.migrate_only {
        tracing::info!("migrations applied, exiting (--migrate-only)");
        return Ok(());
    }

    let repository = database::DbRepository::new(pool);

    let exchange: Arc<dyn Exchange> = match settings.exchange_name.as_str() {
        "paper" => {
            let paper = PaperExchange::new(PaperExchangeConfig {
                slippage_percent: settings.paper_slippage_percent,
                fee_percent: settings.paper_fee_percent,
            });
            paper.seed_balance(&settings.paper_seed_currency, settings.paper_seed_balance);
            Arc::new(paper)
        }
        other => anyhow::bail!("unsupported exchange '{other}'; only 'paper' is wired up today"),
    };

    let bus = Arc::new(InProcessBus::new());
    let symbols = settings.symbol_list();

    let engine = Engine::new(
        repository,
        bus,
        exchange,
        settings.strategy_name.clone(),
        symbols,
        settings.paper_seed_currency.clone(),
    );

    let cancel = tokio_util::sync::CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    engine.run(cancel).await.context("engine exited with an error")?;

    Ok(())
}
