// Bot lifecycle: wire collaborators, start the feed, run the loop until shutdown

use crate::{
    arguments,
    config::{self, Config},
    exchange::{ExchangeClient, PaperExchange, RetryPolicy, RetryingExchange},
    logger::{self, LogTag},
    models::ModelStore,
    orchestrator::{AttachedSignals, CsvReplayFeed, Orchestrator, OrchestratorFiles, OrchestratorParts},
    paths,
    symbols::CandleCsvHistory,
    training::CommandTrainer,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// Market events buffered between the feed and the loop
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Main bot execution function - handles the full bot lifecycle
pub async fn run_bot() -> Result<(), String> {
    // 1. Ensure all required directories exist (already done in main.rs)
    paths::ensure_all_directories()
        .map_err(|e| format!("Failed to create required directories: {}", e))?;

    // 2. Snapshot config; components get their own sections from here on
    let mut config: Config = config::get_config_clone();
    if arguments::is_no_training_enabled() {
        logger::info(LogTag::System, "🎓 Automatic training disabled (--no-training)");
        config.model.auto_train_new_symbols = false;
    }

    // 3. Only the paper venue ships in-tree
    if !arguments::is_paper_enabled() {
        return Err(
            "No live exchange adapter is built in; run with --paper to trade against the paper venue"
                .to_string(),
        );
    }

    let paper = Arc::new(PaperExchange::new(
        config.exchange.paper_starting_equity,
        config.exchange.paper_step_size,
        config.exchange.paper_min_notional,
    ));
    let exchange: Arc<dyn ExchangeClient> = Arc::new(RetryingExchange::new(
        Arc::clone(&paper) as Arc<dyn ExchangeClient>,
        RetryPolicy::from_config(&config.exchange),
    ));

    let store = Arc::new(ModelStore::from_config(
        paths::get_models_directory(),
        &config.model,
    ));
    let trainer = Arc::new(CommandTrainer::new(
        &config.training.trainer_command,
        config.training.trainer_args.clone(),
    ));
    let history = CandleCsvHistory::new(paths::get_historical_data_directory());

    logger::info(
        LogTag::System,
        &format!(
            "📦 Model version {} in {}",
            config.model.version,
            store.dir().display()
        ),
    );

    let symbols = config.exchange.symbols.clone();
    let replay_candles = config.operations.replay_candles;
    let replay_pace = Duration::from_millis(config.operations.replay_pace_ms);

    let orchestrator = Orchestrator::new(
        config,
        OrchestratorParts {
            exchange,
            store,
            trainer,
            history: Arc::new(history.clone()),
            signals: Box::new(AttachedSignals),
            files: OrchestratorFiles::standard(),
            mode: "paper".to_string(),
        },
    )
    .map_err(|e| format!("Failed to build orchestrator: {}", e))?;

    // 4. Shutdown wiring
    let shutdown = Arc::new(Notify::new());
    install_signal_handler(Arc::clone(&shutdown))?;

    if let Some(secs) = arguments::get_run_duration_seconds() {
        logger::info(
            LogTag::System,
            &format!("⏱️ Run limited to {}s (--duration)", secs),
        );
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            logger::info(LogTag::System, "⏱️ Run duration reached, stopping");
            shutdown.notify_one();
        });
    }

    // 5. Event source: paper replay over the local candle history
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let feed = CsvReplayFeed::new(history, symbols, replay_candles, replay_pace)
        .with_paper_prices(Arc::clone(&paper));
    let feed_task = tokio::spawn(feed.run(tx, Arc::clone(&shutdown)));

    // 6. Main loop (returns after graceful shutdown)
    let stats = orchestrator.run(rx, shutdown).await;
    feed_task.abort();

    logger::info(
        LogTag::System,
        &format!(
            "🏁 Stopped after {} ticks: {} events, {} orders, {} skipped entries, {} closes",
            stats.ticks,
            stats.events,
            stats.orders_placed,
            stats.entries_skipped,
            stats.positions_closed
        ),
    );

    Ok(())
}

/// First Ctrl+C requests a graceful stop; a second one exits immediately
fn install_signal_handler(shutdown: Arc<Notify>) -> Result<(), String> {
    let requested = Arc::new(AtomicBool::new(false));

    ctrlc::set_handler(move || {
        if requested.swap(true, Ordering::SeqCst) {
            eprintln!("\n⚠️  Forced shutdown");
            logger::flush();
            std::process::exit(130);
        }
        eprintln!("\n🛑 Shutdown requested, finishing current work (Ctrl+C again to force)");
        shutdown.notify_one();
    })
    .map_err(|e| format!("Failed to install Ctrl+C handler: {}", e))
}
