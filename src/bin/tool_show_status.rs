use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{presets::UTF8_FULL, Table};
use metabot::config;
use metabot::monitoring::{read_status_file, StatusSnapshot};
use metabot::paths;
use std::path::PathBuf;

/// Render the status file a running (or stopped) bot maintains.
#[derive(Parser, Debug)]
#[command(name = "tool_show_status", about = "Show the bot status file")]
struct Args {
    /// Base directory (defaults to the platform data dir)
    #[arg(long)]
    base_dir: Option<String>,

    /// Status file (overrides the base directory layout)
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Drop the kill-switch reset marker; the bot consumes it on its next health check
    #[arg(long, default_value_t = false)]
    reset_kill_switch: bool,
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

    if args.reset_kill_switch {
        let marker = paths::get_kill_switch_reset_path();
        std::fs::write(&marker, chrono::Utc::now().to_rfc3339())
            .with_context(|| format!("writing {}", marker.display()))?;
        println!("Kill switch reset requested ({})", marker.display());
        return Ok(());
    }

    let path = args.status_file.unwrap_or_else(paths::get_status_file_path);
    let Some(status) = read_status_file(&path).with_context(|| format!("reading {}", path.display()))? else {
        println!("No status file at {}", path.display());
        return Ok(());
    };

    print_overview(&status);
    print_symbols(&status);
    print_positions(&status);
    print_training(&status);
    println!("{}", status.pnl.render_table());
    Ok(())
}

fn print_overview(status: &StatusSnapshot) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Field", "Value"]);

    let health = status
        .health
        .as_ref()
        .map(|h| h.status.to_string())
        .unwrap_or_else(|| "-".to_string());
    let kill_switch = match (&status.kill_switch.engaged, &status.kill_switch.cause) {
        (true, Some(cause)) => format!("ENGAGED ({})", cause),
        (true, None) => "ENGAGED".to_string(),
        (false, _) => "clear".to_string(),
    };

    let rows = vec![
        ("Updated", status.timestamp.to_rfc3339()),
        ("Running", status.running.to_string()),
        ("Mode", status.mode.clone()),
        ("Uptime", format!("{}s", status.uptime_secs())),
        ("Equity", format!("{:.2}", status.equity)),
        ("Health", health),
        ("Model", status.model.version_id.clone()),
        ("Guard", status.guard.status.to_string()),
        ("Drawdown", format!("{:.2}%", status.guard.drawdown * 100.0)),
        ("Kill switch", kill_switch),
        ("Recent errors", status.kill_switch.recent_errors.to_string()),
    ];
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value]);
    }
    println!("{}", table);

    if let Some(report) = &status.health {
        for issue in &report.issues {
            println!("  ❌ {}", issue);
        }
        for warning in &report.warnings {
            println!("  ⚠️  {}", warning);
        }
    }
}

fn print_symbols(status: &StatusSnapshot) {
    if status.symbols.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Symbol", "State", "Coverage", "Days", "Last error"]);
    for record in &status.symbols {
        table.add_row(vec![
            record.symbol.clone(),
            record.state.to_string(),
            format!("{:.1}%", record.history_coverage_pct * 100.0),
            record.available_days.to_string(),
            record.last_error.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);
}

fn print_positions(status: &StatusSnapshot) {
    if status.positions.is_empty() {
        println!("No open positions");
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Symbol", "Side", "Size", "Entry", "Stop", "Target", "Origin"]);
    for position in &status.positions {
        table.add_row(vec![
            position.symbol.clone(),
            position.side.to_string(),
            format!("{}", position.size),
            format!("{:.4}", position.entry_price),
            format!("{:.4}", position.stop_loss),
            format!("{:.4}", position.take_profit),
            format!("{:?}", position.origin),
        ]);
    }
    println!("{}", table);
}

fn print_training(status: &StatusSnapshot) {
    if status.training_jobs.is_empty() {
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Symbol", "Status", "Queued", "Started"]);
    for job in &status.training_jobs {
        table.add_row(vec![
            job.symbol.clone(),
            format!("{:?}", job.status),
            job.queued_at.to_rfc3339(),
            job.started_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table);
}
