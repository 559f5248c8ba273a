use std::path::Path;

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app: GeneralConfig,
    pub monitoring: MonitoringConfig,
    pub http: HttpConfig,
    pub sports: SportsConfig,
    pub ticketmaster: TicketmasterConfig,
    pub special_events: SpecialEventsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    /// IANA zone every "today"/"tomorrow" comparison is made in.
    pub time_zone: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default = "default_true")]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SportsConfig {
    #[serde(default)]
    pub scoreboards: Vec<ScoreboardFeedConfig>,
    #[serde(default)]
    pub team_schedules: Vec<TeamScheduleFeedConfig>,
}

/// A league-wide scoreboard; games count when the home side carries `abbreviation`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScoreboardFeedConfig {
    pub team_name: String,
    pub url: String,
    pub abbreviation: String,
}

/// A single team's schedule; games count only when played at `home_venue`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TeamScheduleFeedConfig {
    pub team_name: String,
    pub url: String,
    pub home_venue: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketmasterConfig {
    pub base_url: String,
    /// Name of the secret holding the API key. Unset disables the source.
    #[serde(default)]
    pub api_key_secret_name: Option<String>,
    pub requests_per_second: u32,
    pub burst_size: u32,
    pub max_wait_ms: u64,
    #[serde(default)]
    pub ignored_subtype_ids: Vec<String>,
    #[serde(default)]
    pub ignored_attraction_ids: Vec<String>,
    #[serde(default)]
    pub opponent_suffixes: Vec<String>,
    pub venues: Vec<VenueConfig>,
    pub teams: Vec<TeamAttractionConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct VenueConfig {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TeamAttractionConfig {
    pub attraction_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpecialEventsConfig {
    pub database_path: String,
    pub page_size: u32,
}

fn default_true() -> bool {
    true
}

/// Values that only ever come from the environment.
/// Not serializable, not stored in config files.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub ticketmaster_api_key_secret_name: Option<String>,
    pub special_events_db_path: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            ticketmaster_api_key_secret_name: non_empty_var("TICKETMASTER_API_KEY_SECRET_NAME"),
            special_events_db_path: non_empty_var("SPECIAL_EVENTS_DB_PATH"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from a TOML file, overlaying environment variables.
    pub fn load(config_path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let secrets = Secrets::from_env();
        config.apply_overrides(&secrets);

        Ok((config, secrets))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    fn apply_overrides(&mut self, secrets: &Secrets) {
        if let Some(name) = &secrets.ticketmaster_api_key_secret_name {
            self.ticketmaster.api_key_secret_name = Some(name.clone());
        }
        if let Some(path) = &secrets.special_events_db_path {
            self.special_events.database_path = path.clone();
        }
    }

    /// Teams an ESPN feed reports that Ticketmaster would also report.
    /// Each one would show up twice in the feed.
    pub fn overlapping_teams(&self) -> Vec<String> {
        let espn_teams = self
            .sports
            .scoreboards
            .iter()
            .map(|f| f.team_name.as_str())
            .chain(self.sports.team_schedules.iter().map(|f| f.team_name.as_str()));

        let mut overlapping: Vec<String> = espn_teams
            .filter(|name| {
                self.ticketmaster.teams.iter().any(|t| {
                    t.name == *name
                        && !self
                            .ticketmaster
                            .ignored_attraction_ids
                            .contains(&t.attraction_id)
                })
            })
            .map(str::to_string)
            .collect();
        overlapping.dedup();
        overlapping
    }

    /// Parse the configured zone. Callers treat failure as fatal at startup.
    pub fn time_zone(&self) -> Result<Tz> {
        self.app
            .time_zone
            .parse::<Tz>()
            .map_err(|e| anyhow!("could not load time zone '{}': {e}", self.app.time_zone))
    }
}
