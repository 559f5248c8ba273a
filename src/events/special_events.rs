//! Hand-curated events keyed by calendar date.
//!
//! Anything the upstream APIs miss (one-off matches, exhibition games,
//! parades) is entered into this store ahead of time and merged into the
//! feed like any other source.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use tracing::info;

use crate::events::window::TimeWindow;
use crate::events::{DayEvents, Event, EventSource, SourceError};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("migration failed on '{statement}': {error}")]
    Migration {
        statement: String,
        #[source]
        error: sqlx::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow)]
pub struct SpecialEventRecord {
    pub date: String,
    pub slug: String,
    pub team_name: String,
    pub venue: String,
    pub local_time: String,
    pub opponent: String,
    pub raw_description: String,
    pub raw_time: i64,
}

impl SpecialEventRecord {
    /// A record with a description is shown verbatim; otherwise it is a game.
    pub fn into_event(self) -> Event {
        if !self.raw_description.is_empty() {
            Event::freeform(self.raw_description, self.raw_time)
        } else {
            Event::game(
                self.team_name,
                self.opponent,
                self.venue,
                self.local_time,
                self.raw_time,
            )
        }
    }
}

/// One page of a date query. `next_cursor` is set when more rows may follow.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<SpecialEventRecord>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait SpecialEventsStore: Send + Sync {
    async fn query_page(&self, date: NaiveDate, cursor: Option<&str>) -> Result<Page, StoreError>;
}

/// Every event stored for `date`, following cursors until the store runs dry.
pub async fn special_events_for_date(
    store: &dyn SpecialEventsStore,
    date: NaiveDate,
) -> Result<Vec<Event>, StoreError> {
    let mut events = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = store.query_page(date, cursor.as_deref()).await?;
        events.extend(page.records.into_iter().map(SpecialEventRecord::into_event));

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(events)
}

/// SQLite-backed store, paginated by slug within a date.
pub struct SqliteSpecialEvents {
    pool: SqlitePool,
    page_size: u32,
}

impl SqliteSpecialEvents {
    pub async fn new(database_path: &str, page_size: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        // Each connection to ":memory:" is its own database.
        let max_connections = if database_path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let store = Self {
            pool,
            page_size: page_size.max(1),
        };
        store.migrate().await?;

        info!(database_path, "opened special events store");
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                continue;
            }
            sqlx::query(trimmed)
                .execute(&self.pool)
                .await
                .map_err(|error| StoreError::Migration {
                    statement: trimmed.to_string(),
                    error,
                })?;
        }
        Ok(())
    }

    pub async fn insert(&self, record: &SpecialEventRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO special_events (date, slug, team_name, venue, local_time, opponent, raw_description, raw_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.date)
        .bind(&record.slug)
        .bind(&record.team_name)
        .bind(&record.venue)
        .bind(&record.local_time)
        .bind(&record.opponent)
        .bind(&record.raw_description)
        .bind(record.raw_time)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl SpecialEventsStore for SqliteSpecialEvents {
    async fn query_page(&self, date: NaiveDate, cursor: Option<&str>) -> Result<Page, StoreError> {
        let date = date.format(DATE_FORMAT).to_string();

        let records = sqlx::query_as::<_, SpecialEventRecord>(
            "SELECT date, slug, team_name, venue, local_time, opponent, raw_description, raw_time
             FROM special_events
             WHERE date = ? AND (? IS NULL OR slug > ?)
             ORDER BY slug
             LIMIT ?",
        )
        .bind(&date)
        .bind(cursor)
        .bind(cursor)
        .bind(i64::from(self.page_size))
        .fetch_all(&self.pool)
        .await?;

        let next_cursor = if records.len() as u64 == u64::from(self.page_size) {
            records.last().map(|r| r.slug.clone())
        } else {
            None
        };

        Ok(Page {
            records,
            next_cursor,
        })
    }
}

/// Today's and tomorrow's curated events.
pub struct SpecialEventsSource {
    store: Arc<dyn SpecialEventsStore>,
}

impl SpecialEventsSource {
    pub fn new(store: Arc<dyn SpecialEventsStore>) -> Self {
        Self { store }
    }

    async fn for_date(&self, date: NaiveDate) -> Result<Vec<Event>, SourceError> {
        special_events_for_date(self.store.as_ref(), date)
            .await
            .map_err(|error| SourceError::Store {
                origin: format!("special_events:{date}"),
                error,
            })
    }
}

#[async_trait]
impl EventSource for SpecialEventsSource {
    async fn fetch(&self, window: &TimeWindow) -> Result<DayEvents, SourceError> {
        let today = self.for_date(window.today()).await?;
        let tomorrow = self.for_date(window.tomorrow()).await?;

        info!(
            today = today.len(),
            tomorrow = tomorrow.len(),
            "loaded special events"
        );
        Ok(DayEvents { today, tomorrow })
    }

    fn name(&self) -> &str {
        "special_events"
    }
}
