use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;

use seattle_sports_today::config::AppConfig;
use seattle_sports_today::events::window::TimeWindow;
use seattle_sports_today::monitoring::logger;
use seattle_sports_today::pipeline;

/// Build today's Seattle sports and events feed.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config/default.toml")]
    config: PathBuf,

    /// Build the feed for this local date instead of today (YYYY-MM-DD).
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Write the feed here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config, _secrets) = AppConfig::load(&args.config)?;

    logger::init_logging(&config.monitoring)?;

    for team in config.overlapping_teams() {
        tracing::warn!(
            team = %team,
            "team is reported by both ESPN and Ticketmaster; its games will be listed twice"
        );
    }

    let tz = config.time_zone()?;
    let window = match args.date {
        Some(date) => TimeWindow::for_date(date, tz)?,
        None => TimeWindow::resolve(Utc::now(), tz)?,
    };

    tracing::info!(
        today = %window.today(),
        tomorrow = %window.tomorrow(),
        backfill = args.date.is_some(),
        "seattle-sports-today starting"
    );

    let rendered = match pipeline::run(&config, &window).await {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::error!(error = ?e, "could not build feed");
            return Err(e);
        }
    };

    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write feed to {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote feed");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
