//! Ticketmaster Discovery API source.
//!
//! Every tracked venue is searched for listings starting between local
//! midnight today and local midnight the day after tomorrow. Venues are
//! queried one at a time behind a token-bucket throttle so a single run
//! stays inside the vendor's per-second quota.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{TicketmasterConfig, VenueConfig};
use crate::events::window::TimeWindow;
use crate::events::{decode_json, send_checked, DayEvents, Event, EventSource, SourceError};
use crate::secrets::SecretStore;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Segment id Ticketmaster assigns to all sporting events.
const SPORTS_SEGMENT_ID: &str = "KZFzniwnSyZfZ7v7nE";

const UNKNOWN_OPPONENT: &str = "some unknown opponent";

const TIME_TBA: &str = "TBA";

const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThrottleError {
    #[error("rate limiter did not free up within {0:?}")]
    WaitExceeded(Duration),
}

/// Pacing between venue queries.
#[derive(Clone)]
pub enum Throttle {
    Limited {
        limiter: Arc<Limiter>,
        max_wait: Duration,
    },
    /// Never waits. Used under test.
    Unlimited,
}

impl Throttle {
    pub fn per_second(requests_per_second: u32, burst_size: u32, max_wait: Duration) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst_size).unwrap_or(NonZeroU32::MIN);

        let quota = Quota::per_second(rps).allow_burst(burst);
        Self::Limited {
            limiter: Arc::new(RateLimiter::direct(quota)),
            max_wait,
        }
    }

    pub async fn wait(&self) -> Result<(), ThrottleError> {
        match self {
            Self::Unlimited => Ok(()),
            Self::Limited { limiter, max_wait } => {
                tokio::time::timeout(*max_wait, limiter.until_ready())
                    .await
                    .map_err(|_| ThrottleError::WaitExceeded(*max_wait))
            }
        }
    }
}

/// Why a listing was dropped before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Cancelled,
    NoClassifications,
    IncompleteSportsListing,
    IgnoredSubtype,
    IgnoredAttraction,
    DateUnannounced,
}

impl IgnoreReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancelled => "event is cancelled",
            Self::NoClassifications => "no classifications",
            Self::IncompleteSportsListing => "sports event with fewer than two attractions",
            Self::IgnoredSubtype => "ignored classification subtype",
            Self::IgnoredAttraction => "ignored attraction",
            Self::DateUnannounced => "date is TBD",
        }
    }
}

/// Static knowledge used to filter and label listings.
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    /// attraction id → display name
    teams: HashMap<String, String>,
    ignored_subtypes: HashSet<String>,
    ignored_attractions: HashSet<String>,
    opponent_suffixes: Vec<String>,
}

impl FilterRules {
    pub fn from_config(config: &TicketmasterConfig) -> Self {
        Self {
            teams: config
                .teams
                .iter()
                .map(|t| (t.attraction_id.clone(), t.name.clone()))
                .collect(),
            ignored_subtypes: config.ignored_subtype_ids.iter().cloned().collect(),
            ignored_attractions: config.ignored_attraction_ids.iter().cloned().collect(),
            opponent_suffixes: config.opponent_suffixes.clone(),
        }
    }

    fn team_name(&self, attraction_id: &str) -> Option<&str> {
        self.teams.get(attraction_id).map(String::as_str)
    }

    fn strip_suffix<'a>(&self, name: &'a str) -> &'a str {
        self.opponent_suffixes
            .iter()
            .find_map(|suffix| name.strip_suffix(suffix.as_str()))
            .unwrap_or(name)
            .trim_end()
    }
}

/// First exclusion rule the listing trips, if any. Order matters.
pub fn ignore_reason(event: &RawEvent, rules: &FilterRules) -> Option<IgnoreReason> {
    if event.dates.status.code == "cancelled" {
        return Some(IgnoreReason::Cancelled);
    }

    let Some(primary) = event.classifications.first() else {
        return Some(IgnoreReason::NoClassifications);
    };

    let is_sports = event
        .classifications
        .iter()
        .any(|c| c.segment.id == SPORTS_SEGMENT_ID);
    if is_sports && event.embedded.attractions.len() < 2 {
        return Some(IgnoreReason::IncompleteSportsListing);
    }

    if rules.ignored_subtypes.contains(&primary.sub_type.id) {
        return Some(IgnoreReason::IgnoredSubtype);
    }

    if event
        .embedded
        .attractions
        .iter()
        .any(|a| rules.ignored_attractions.contains(&a.id))
    {
        return Some(IgnoreReason::IgnoredAttraction);
    }

    if event.dates.start.date_tbd || event.dates.start.date_tba {
        return Some(IgnoreReason::DateUnannounced);
    }

    None
}

pub fn event_should_be_ignored(event: &RawEvent, venue_name: &str, rules: &FilterRules) -> bool {
    match ignore_reason(event, rules) {
        Some(reason) => {
            info!(name = %event.name, venue_name, reason = reason.as_str(), "ignoring event");
            true
        }
        None => false,
    }
}

/// When the listing starts and how to display it. `None` skips the listing.
fn resolve_start(
    event: &RawEvent,
    venue_name: &str,
    window: &TimeWindow,
) -> Option<(DateTime<Utc>, String)> {
    let start = &event.dates.start;

    if start.time_tba && !start.date_tbd {
        return match NaiveDate::parse_from_str(&start.local_date, "%Y-%m-%d") {
            // Pinned to noon so sort order stays deterministic.
            Ok(date) => Some((window.local_noon(date), TIME_TBA.to_string())),
            Err(e) => {
                error!(error = %e, venue_name, event_name = %event.name, local_date = %start.local_date, "could not parse local date");
                None
            }
        };
    }

    let Some(raw) = start.date_time.as_deref() else {
        error!(venue_name, event_name = %event.name, "listing has no start time");
        return None;
    };
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => {
            let t = t.with_timezone(&Utc);
            Some((t, window.format_local_time(t)))
        }
        Err(e) => {
            error!(error = %e, venue_name, event_name = %event.name, date_time = raw, "could not parse start time");
            None
        }
    }
}

fn build_event(
    event: &RawEvent,
    venue_name: &str,
    rules: &FilterRules,
    window: &TimeWindow,
) -> Option<(Event, DateTime<Utc>)> {
    let (start, local_time) = resolve_start(event, venue_name, window)?;

    let team = event
        .embedded
        .attractions
        .iter()
        .find_map(|a| rules.team_name(&a.id));

    let Some(team) = team else {
        let description = format!("{} is at {venue_name}. It starts at {local_time}", event.name);
        return Some((Event::freeform(description, start.timestamp()), start));
    };

    let opponent = event
        .embedded
        .attractions
        .iter()
        .find(|a| rules.team_name(&a.id).is_none())
        .map(|a| rules.strip_suffix(&a.name))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| {
            warn!(venue_name, event_name = %event.name, "could not find opponent attraction");
            UNKNOWN_OPPONENT
        });

    Some((
        Event::game(team, opponent, venue_name, local_time, start.timestamp()),
        start,
    ))
}

/// Normalize one venue's search results into today/tomorrow buckets.
pub fn normalize_search(
    payload: &SearchResponse,
    venue_name: &str,
    rules: &FilterRules,
    window: &TimeWindow,
) -> DayEvents {
    let mut found = DayEvents::default();

    for raw in &payload.embedded.events {
        if event_should_be_ignored(raw, venue_name, rules) {
            continue;
        }

        info!(venue_name, event_name = %raw.name, "found event from ticketmaster");

        let Some((event, start)) = build_event(raw, venue_name, rules, window) else {
            continue;
        };
        if let Some(day) = window.classify(start) {
            found.push(day, event);
        }
    }

    found
}

pub struct TicketmasterSource {
    client: reqwest::Client,
    base_url: String,
    venues: Vec<VenueConfig>,
    rules: FilterRules,
    throttle: Throttle,
    api_key_secret_name: Option<String>,
    secrets: Arc<dyn SecretStore>,
}

impl TicketmasterSource {
    pub fn new(
        client: reqwest::Client,
        config: &TicketmasterConfig,
        secrets: Arc<dyn SecretStore>,
    ) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            venues: config.venues.clone(),
            rules: FilterRules::from_config(config),
            throttle: Throttle::per_second(
                config.requests_per_second,
                config.burst_size,
                Duration::from_millis(config.max_wait_ms),
            ),
            api_key_secret_name: config.api_key_secret_name.clone(),
            secrets,
        }
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    async fn fetch_venue(
        &self,
        venue: &VenueConfig,
        api_key: &SecretString,
        window: &TimeWindow,
    ) -> Result<DayEvents, SourceError> {
        let origin = format!("ticketmaster:{}", venue.name);
        let (start, end) = window.query_range();
        let start = start.with_timezone(&Utc).format(QUERY_TIME_FORMAT).to_string();
        let end = end.with_timezone(&Utc).format(QUERY_TIME_FORMAT).to_string();

        let request = self.client.get(&self.base_url).query(&[
            ("venueId", venue.id.as_str()),
            ("apikey", api_key.expose_secret()),
            ("startDateTime", start.as_str()),
            ("endDateTime", end.as_str()),
        ]);
        let response = send_checked(request, &origin).await?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };
        info!(
            venue_name = %venue.name,
            remaining_requests = %header("Rate-Limit-Available"),
            rate_limit_reset_time = %header("Rate-Limit-Reset"),
            "completed ticketmaster API request"
        );

        let payload: SearchResponse = decode_json(response, &origin).await?;
        Ok(normalize_search(&payload, &venue.name, &self.rules, window))
    }
}

#[async_trait]
impl EventSource for TicketmasterSource {
    async fn fetch(&self, window: &TimeWindow) -> Result<DayEvents, SourceError> {
        let Some(secret_name) = &self.api_key_secret_name else {
            warn!("no ticketmaster API key secret configured; not querying ticketmaster");
            return Ok(DayEvents::default());
        };

        let api_key = self
            .secrets
            .get_secret_string(secret_name)
            .await
            .map_err(|error| SourceError::Secret {
                origin: "ticketmaster".to_string(),
                error,
            })?;

        let mut found = DayEvents::default();
        for (i, venue) in self.venues.iter().enumerate() {
            if i > 0 {
                if let Err(e) = self.throttle.wait().await {
                    error!(error = %e, "could not wait for ticketmaster rate limiter");
                }
            }
            let venue_events = self.fetch_venue(venue, &api_key, window).await?;
            if venue_events.is_empty() {
                info!(venue_name = %venue.name, "no ticketmaster events today or tomorrow");
            }
            found.extend(venue_events);
        }

        Ok(found)
    }

    fn name(&self) -> &str {
        "ticketmaster"
    }
}

// --- Ticketmaster API Response Types ---

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "_embedded", default)]
    embedded: SearchEmbedded,
}

#[derive(Debug, Default, Deserialize)]
struct SearchEmbedded {
    #[serde(default)]
    events: Vec<RawEvent>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawEvent {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dates: Dates,
    #[serde(default)]
    classifications: Vec<Classification>,
    #[serde(rename = "_embedded", default)]
    embedded: EventEmbedded,
}

#[derive(Debug, Default, Deserialize)]
struct Dates {
    #[serde(default)]
    start: Start,
    #[serde(default)]
    status: Status,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Start {
    #[serde(default)]
    local_date: String,
    #[serde(default)]
    date_time: Option<String>,
    #[serde(rename = "dateTBD", default)]
    date_tbd: bool,
    #[serde(rename = "dateTBA", default)]
    date_tba: bool,
    #[serde(rename = "timeTBA", default)]
    time_tba: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Status {
    #[serde(default)]
    code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Classification {
    #[serde(default)]
    segment: Named,
    #[serde(default)]
    sub_type: Named,
}

#[derive(Debug, Default, Deserialize)]
struct EventEmbedded {
    #[serde(default)]
    attractions: Vec<Named>,
}

#[derive(Debug, Default, Deserialize)]
struct Named {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}
