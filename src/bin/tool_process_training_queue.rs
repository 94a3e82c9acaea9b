use anyhow::{bail, Context, Result};
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Table};
use metabot::config::{self, Config};
use metabot::models::ModelStore;
use metabot::paths;
use metabot::training::{update_queue_file, CommandTrainer, ModelTrainer, TrainingQueueFile};
use std::path::PathBuf;

/// Train the symbols the bot left in the persisted training queue.
///
/// Each success is published as a new revision of the configured model version and
/// removed from the queue; a running bot picks the revision up on its next tick.
#[derive(Parser, Debug)]
#[command(
    name = "tool_process_training_queue",
    about = "Train queued symbols and publish them"
)]
struct Args {
    /// Config file (defaults to data/config.toml under the base directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base directory (overrides paths.base_dir from the config)
    #[arg(long)]
    base_dir: Option<String>,

    /// Only train this symbol
    #[arg(long)]
    symbol: Option<String>,

    /// History window requested from the trainer (defaults to training.history_days)
    #[arg(long)]
    days: Option<u32>,

    /// Show the queue without training
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn load_config(args: &Args) -> Result<Config> {
    if let Some(base) = &args.base_dir {
        paths::set_base_directory(base);
    }
    let path = args.config.clone().unwrap_or_else(paths::get_config_path);
    let cfg = if path.exists() {
        config::read_config_file(&path).map_err(anyhow::Error::msg)?
    } else {
        Config::default()
    };
    if args.base_dir.is_none() {
        paths::set_base_directory(&cfg.paths.base_dir);
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = load_config(&args).context("loading config")?;

    let queue_path = paths::get_training_queue_path();
    let queue = TrainingQueueFile::load(&queue_path)
        .with_context(|| format!("reading {}", queue_path.display()))?;

    let symbols: Vec<String> = queue
        .queued_symbols
        .iter()
        .filter(|s| args.symbol.as_deref().map_or(true, |only| only == s.as_str()))
        .cloned()
        .collect();

    if symbols.is_empty() {
        println!("Training queue is empty ({})", queue_path.display());
        return Ok(());
    }

    if args.dry_run {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Symbol", "Queued at"]);
        for symbol in &symbols {
            let queued_at = queue
                .queued_at
                .get(symbol)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![symbol.clone(), queued_at]);
        }
        println!("{}", table);
        return Ok(());
    }

    if cfg.training.trainer_command.trim().is_empty() {
        bail!("training.trainer_command is not configured");
    }

    let trainer = CommandTrainer::new(&cfg.training.trainer_command, cfg.training.trainer_args.clone());
    let store = ModelStore::from_config(paths::get_models_directory(), &cfg.model);
    let days = args.days.unwrap_or(cfg.training.history_days);

    let mut results = Table::new();
    results.load_preset(UTF8_FULL);
    results.set_header(vec!["Symbol", "Result", "Published"]);
    let mut failures = 0usize;

    for symbol in &symbols {
        println!("Training {} on {} days...", symbol, days);
        let outcome = trainer
            .train(symbol, days)
            .map_err(|e| e.to_string())
            .and_then(|artifact| store.publish(&artifact).map_err(|e| e.to_string()));

        match outcome {
            Ok(metadata) => {
                update_queue_file(&queue_path, &[], &[symbol.clone()])
                    .with_context(|| format!("updating {}", queue_path.display()))?;
                results.add_row(vec![symbol.clone(), "trained".to_string(), metadata.version_id()]);
            }
            Err(e) => {
                failures += 1;
                results.add_row(vec![symbol.clone(), format!("failed: {}", e), "-".to_string()]);
            }
        }
    }

    println!("{}", results);
    if failures > 0 {
        bail!("{} of {} symbols failed to train", failures, symbols.len());
    }
    Ok(())
}
