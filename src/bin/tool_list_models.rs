use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Table};
use metabot::config;
use metabot::models::ModelRegistry;
use metabot::paths;
use std::path::PathBuf;

/// List every model version in the models directory and the one selection would pick.
#[derive(Parser, Debug)]
#[command(name = "tool_list_models", about = "List published model versions")]
struct Args {
    /// Base directory (defaults to the platform data dir)
    #[arg(long)]
    base_dir: Option<String>,

    /// Models directory (overrides the base directory layout)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Only consider versions trained in this mode when selecting
    #[arg(long)]
    mode: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(base) = &args.base_dir {
        paths::set_base_directory(base);
    } else {
        let config_path = paths::get_config_path();
        if config_path.exists() {
            let cfg = config::read_config_file(&config_path)
                .map_err(anyhow::Error::msg)
                .context("loading config")?;
            paths::set_base_directory(&cfg.paths.base_dir);
        }
    }

    let dir = args.models_dir.unwrap_or_else(paths::get_models_directory);
    let registry = ModelRegistry::new(dir.clone());
    let listings = registry.list_versions();

    if listings.is_empty() {
        println!("No model versions found in {}", dir.display());
        return Ok(());
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Version", "Revision", "Symbols", "Mode", "Trained until", "Complete", "Score",
    ]);
    for listing in &listings {
        let (revision, mode, trained_until) = match &listing.metadata {
            Some(m) => (
                m.revision.to_string(),
                m.training_mode.clone(),
                m.training_end_timestamp
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        table.add_row(vec![
            listing.version.clone(),
            revision,
            listing.trained_symbol_count().to_string(),
            mode,
            trained_until,
            if listing.complete { "yes" } else { "no" }.to_string(),
            ModelRegistry::score(listing, now).to_string(),
        ]);
    }
    println!("{}", table);

    match registry.select_best(args.mode.as_deref()) {
        Some(best) => {
            let symbols = best
                .metadata
                .as_ref()
                .map(|m| m.trained_symbols.iter().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            println!("\nSelected: v{} [{}]", best.version, symbols);
        }
        None => println!("\nNo complete version to select"),
    }

    Ok(())
}
