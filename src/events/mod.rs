pub mod aggregator;
pub mod espn;
pub mod special_events;
pub mod ticketmaster;
pub mod window;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::events::special_events::StoreError;
use crate::events::window::{Day, TimeWindow};
use crate::secrets::SecretError;

pub use aggregator::get_today_and_tomorrow_games;

/// What an event is, as far as rendering cares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A tracked team hosting an opponent.
    Game {
        team: String,
        opponent: String,
        venue: String,
        local_time: String,
    },
    /// Anything without a natural "team vs. opponent" framing.
    Freeform { description: String },
}

/// A single thing happening today or tomorrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: EventKind,
    /// Unix seconds; used for ordering only.
    pub start: i64,
}

impl Event {
    pub fn game(
        team: impl Into<String>,
        opponent: impl Into<String>,
        venue: impl Into<String>,
        local_time: impl Into<String>,
        start: i64,
    ) -> Self {
        Self {
            kind: EventKind::Game {
                team: team.into(),
                opponent: opponent.into(),
                venue: venue.into(),
                local_time: local_time.into(),
            },
            start,
        }
    }

    pub fn freeform(description: impl Into<String>, start: i64) -> Self {
        Self {
            kind: EventKind::Freeform {
                description: description.into(),
            },
            start,
        }
    }

    pub fn team(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Game { team, .. } => Some(team),
            EventKind::Freeform { .. } => None,
        }
    }

    pub fn opponent(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Game { opponent, .. } => Some(opponent),
            EventKind::Freeform { .. } => None,
        }
    }

    pub fn venue(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Game { venue, .. } => Some(venue),
            EventKind::Freeform { .. } => None,
        }
    }

    pub fn local_time(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Game { local_time, .. } => Some(local_time),
            EventKind::Freeform { .. } => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            EventKind::Game {
                team,
                opponent,
                venue,
                local_time,
            } => write!(
                f,
                "{team} are playing against the {opponent} at {venue}. The game starts at {local_time}."
            ),
            EventKind::Freeform { description } => f.write_str(description),
        }
    }
}

/// One source's findings, already split by day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayEvents {
    pub today: Vec<Event>,
    pub tomorrow: Vec<Event>,
}

impl DayEvents {
    pub fn push(&mut self, day: Day, event: Event) {
        match day {
            Day::Today => self.today.push(event),
            Day::Tomorrow => self.tomorrow.push(event),
        }
    }

    pub fn extend(&mut self, other: DayEvents) {
        self.today.extend(other.today);
        self.tomorrow.extend(other.tomorrow);
    }

    pub fn is_empty(&self) -> bool {
        self.today.is_empty() && self.tomorrow.is_empty()
    }
}

/// Everything found across all sources for one invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventResults {
    pub today: Vec<Event>,
    pub tomorrow: Vec<Event>,
}

impl EventResults {
    pub fn append(&mut self, found: DayEvents) {
        self.today.extend(found.today);
        self.tomorrow.extend(found.tomorrow);
    }

    /// Stable sort of both days by start time. No deduplication happens
    /// here; sources must not report events another source covers.
    pub fn finalize(&mut self) {
        self.today.sort_by_key(|e| e.start);
        self.tomorrow.sort_by_key(|e| e.start);
    }

    pub fn total(&self) -> usize {
        self.today.len() + self.tomorrow.len()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{origin}: could not contact upstream: {error}")]
    Transport {
        origin: String,
        #[source]
        error: reqwest::Error,
    },
    #[error("{origin}: upstream returned {status}: {body}")]
    Status {
        origin: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{origin}: could not decode response: {error}")]
    Decode {
        origin: String,
        #[source]
        error: serde_json::Error,
    },
    #[error("{origin}: upstream payload missing {field}")]
    MissingIdentity { origin: String, field: &'static str },
    #[error("{origin}: could not parse start time '{value}': {error}")]
    InvalidTime {
        origin: String,
        value: String,
        #[source]
        error: chrono::ParseError,
    },
    #[error("{origin}: could not load secret: {error}")]
    Secret {
        origin: String,
        #[source]
        error: SecretError,
    },
    #[error("{origin}: special events store failed: {error}")]
    Store {
        origin: String,
        #[source]
        error: StoreError,
    },
    #[error("{origin}: task failed: {message}")]
    Task { origin: String, message: String },
}

/// A producer of today/tomorrow events.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Fetch everything this source knows about for the window. Either the
    /// whole result is valid or an error is returned.
    async fn fetch(&self, window: &TimeWindow) -> Result<DayEvents, SourceError>;

    /// Human-readable name of this source.
    fn name(&self) -> &str;
}

/// Send a request and fail on transport errors or non-2xx responses.
/// Error bodies are captured for diagnosis.
pub(crate) async fn send_checked(
    request: reqwest::RequestBuilder,
    origin: &str,
) -> Result<reqwest::Response, SourceError> {
    let response = request.send().await.map_err(|error| {
        error!(origin, error = %error, "could not contact upstream");
        SourceError::Transport {
            origin: origin.to_string(),
            error,
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = error_body(response.text().await, origin);
        error!(origin, %status, "error retrieving data from upstream");
        return Err(SourceError::Status {
            origin: origin.to_string(),
            status,
            body,
        });
    }

    Ok(response)
}

fn error_body(read: Result<String, reqwest::Error>, origin: &str) -> String {
    match read {
        Ok(body) => body,
        Err(error) => {
            error!(origin, error = %error, "could not read error response body");
            format!("could not read error body: {error}")
        }
    }
}

/// Read the body and decode it as `T`.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
    origin: &str,
) -> Result<T, SourceError> {
    let body = response
        .text()
        .await
        .map_err(|error| SourceError::Transport {
            origin: origin.to_string(),
            error,
        })?;

    serde_json::from_str(&body).map_err(|error| {
        error!(origin, error = %error, "could not decode response");
        SourceError::Decode {
            origin: origin.to_string(),
            error,
        }
    })
}
