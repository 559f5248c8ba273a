//! Wiring from configuration to a rendered feed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{AppConfig, HttpConfig};
use crate::events::espn::SportsSource;
use crate::events::special_events::{SpecialEventsSource, SqliteSpecialEvents};
use crate::events::ticketmaster::TicketmasterSource;
use crate::events::window::TimeWindow;
use crate::events::{get_today_and_tomorrow_games, EventResults, EventSource};
use crate::feed;
use crate::secrets::{EnvSecretStore, SecretStore};

pub fn build_http_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to build HTTP client")
}

/// Every source the feed is built from, in no particular order.
pub async fn build_sources(
    config: &AppConfig,
    secrets: Arc<dyn SecretStore>,
) -> Result<Vec<Arc<dyn EventSource>>> {
    let client = build_http_client(&config.http)?;

    let db_path = std::path::Path::new(&config.special_events.database_path);
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let store = SqliteSpecialEvents::new(
        &config.special_events.database_path,
        config.special_events.page_size,
    )
    .await
    .with_context(|| {
        format!(
            "Failed to open special events store at {}",
            config.special_events.database_path
        )
    })?;

    let sources: Vec<Arc<dyn EventSource>> = vec![
        Arc::new(SportsSource::new(client.clone(), &config.sports)),
        Arc::new(TicketmasterSource::new(client, &config.ticketmaster, secrets)),
        Arc::new(SpecialEventsSource::new(Arc::new(store))),
    ];
    Ok(sources)
}

/// Aggregate today's and tomorrow's events for `window`.
pub async fn collect(
    window: &TimeWindow,
    sources: &[Arc<dyn EventSource>],
) -> Result<EventResults> {
    let results = get_today_and_tomorrow_games(window, sources)
        .await
        .with_context(|| format!("could not gather events for {}", window.today()))?;

    info!(
        date = %window.today(),
        today = results.today.len(),
        tomorrow = results.tomorrow.len(),
        total = results.total(),
        "collected events"
    );
    Ok(results)
}

/// Full run: build sources from config, aggregate, render the feed.
pub async fn run(config: &AppConfig, window: &TimeWindow) -> Result<String> {
    let sources = build_sources(config, Arc::new(EnvSecretStore)).await?;
    let results = collect(window, &sources).await?;
    feed::render_json(window, &results)
}
